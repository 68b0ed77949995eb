use crate::{
    Exercise, GapfillError, RuleTagger, Tagger, Variation, VariationParams, VariationRequest,
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type SharedState = Arc<AppState>;

#[derive(Clone)]
pub struct AppState {
    pub tagger: Arc<dyn Tagger>,
}

impl AppState {
    pub fn with_tagger(tagger: Arc<dyn Tagger>) -> Self {
        Self { tagger }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_tagger(Arc::new(RuleTagger))
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 6000)),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

/// Installs the global `tracing` subscriber; `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    serve_with_state(config, AppState::default()).await
}

pub async fn serve_with_state(config: WebConfig, state: AppState) -> Result<(), WebError> {
    let tagger = state.tagger.name();
    let router = build_router(Arc::new(state));
    info!(%config.addr, tagger, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GapfillError> for ApiError {
    fn from(err: GapfillError) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }
        warn!(error = %err, "exercise generation failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/generate", post(api_generate))
        .route("/blank", post(api_blank))
        .route("/api/variations", get(api_variations))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "gapfill-web" }))
}

async fn api_generate(
    State(state): State<SharedState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Exercise>, ApiError> {
    let Json(request) = payload?;
    let (text, variation) = request.into_parts()?;
    let generated = crate::generate(state.tagger.as_ref(), &text, &variation)?;
    debug!(
        variation = %variation.variation,
        seeded = variation.seed.is_some(),
        candidates = generated.candidate_count,
        blanks = generated.blank_count,
        "generated exercise"
    );
    Ok(Json(generated.exercise))
}

async fn api_blank(
    State(state): State<SharedState>,
    payload: Result<Json<LegacyRequest>, JsonRejection>,
) -> Result<Json<LegacyResponse>, ApiError> {
    let Json(request) = payload?;
    let text = request.text.unwrap_or_default();
    let result = crate::generate_legacy(state.tagger.as_ref(), &text)?;
    Ok(Json(LegacyResponse { result }))
}

async fn api_variations() -> Json<VariationsPayload> {
    Json(VariationsPayload {
        default: Variation::default().as_str(),
        variations: Variation::ALL
            .iter()
            .map(|variation| VariationInfo {
                name: variation.as_str(),
                parameters: variation.parameters(),
                random: variation.is_random(),
            })
            .collect(),
    })
}

/// Body of `POST /generate`. Numeric fields accept JSON numbers or numeric
/// strings; anything else is reported as an invalid parameter.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub variation_type: Option<String>,
    #[serde(default)]
    blank_ratio: Option<NumberParam>,
    #[serde(default)]
    seed: Option<NumberParam>,
    #[serde(default)]
    attempt_number: Option<NumberParam>,
    #[serde(default)]
    base_blank_ratio: Option<NumberParam>,
    #[serde(default)]
    step: Option<NumberParam>,
    #[serde(default)]
    max_blank_ratio: Option<NumberParam>,
    #[serde(default)]
    difficulty_level: Option<NumberParam>,
}

impl GenerateRequest {
    /// Validates in order: text, variation name, numeric parameters.
    pub fn into_parts(self) -> Result<(String, VariationRequest), GapfillError> {
        let text = self.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GapfillError::MissingText);
        }
        let variation = match self.variation_type.as_deref() {
            Some(name) => name.parse::<Variation>()?,
            None => Variation::default(),
        };
        let defaults = VariationParams::default();
        let params = VariationParams {
            blank_ratio: self
                .blank_ratio
                .map(|value| value.as_f64("blank_ratio"))
                .transpose()?,
            base_blank_ratio: float_or(
                self.base_blank_ratio,
                "base_blank_ratio",
                defaults.base_blank_ratio,
            )?,
            step: float_or(self.step, "step", defaults.step)?,
            attempt_number: int_or(
                self.attempt_number,
                "attempt_number",
                defaults.attempt_number,
            )?,
            max_blank_ratio: float_or(
                self.max_blank_ratio,
                "max_blank_ratio",
                defaults.max_blank_ratio,
            )?,
            difficulty_level: int_or(
                self.difficulty_level,
                "difficulty_level",
                defaults.difficulty_level,
            )?,
        };
        let seed = self.seed.map(|value| value.as_seed()).transpose()?;
        Ok((
            text,
            VariationRequest {
                variation,
                params,
                seed,
            },
        ))
    }
}

fn float_or(
    value: Option<NumberParam>,
    name: &'static str,
    default: f64,
) -> Result<f64, GapfillError> {
    value.map_or(Ok(default), |value| value.as_f64(name))
}

fn int_or(
    value: Option<NumberParam>,
    name: &'static str,
    default: i64,
) -> Result<i64, GapfillError> {
    value.map_or(Ok(default), |value| value.as_i64(name))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberParam {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl NumberParam {
    fn as_f64(&self, name: &'static str) -> Result<f64, GapfillError> {
        let parsed = match self {
            NumberParam::Number(number) => number.as_f64(),
            NumberParam::Text(text) => text.trim().parse::<f64>().ok(),
            NumberParam::Other(_) => None,
        };
        parsed
            .filter(|value| value.is_finite())
            .ok_or_else(|| self.invalid(name))
    }

    /// Accepts integers and whole floats such as `2.0` or `"2.0"`.
    fn as_i64(&self, name: &'static str) -> Result<i64, GapfillError> {
        let parsed = match self {
            NumberParam::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(whole_number)),
            NumberParam::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(whole_number))
            }
            NumberParam::Other(_) => None,
        };
        parsed.ok_or_else(|| self.invalid(name))
    }

    /// Like [`NumberParam::as_i64`], plus the full `u64` range. Negative
    /// seeds are reinterpreted bit-for-bit as `u64`.
    fn as_seed(&self) -> Result<u64, GapfillError> {
        let parsed = match self {
            NumberParam::Number(number) => number.as_u64(),
            NumberParam::Text(text) => text.trim().parse::<u64>().ok(),
            NumberParam::Other(_) => None,
        };
        match parsed {
            Some(seed) => Ok(seed),
            None => self.as_i64("seed").map(|value| value as u64),
        }
    }

    fn invalid(&self, name: &'static str) -> GapfillError {
        let raw = match self {
            NumberParam::Number(number) => number.to_string(),
            NumberParam::Text(text) => text.clone(),
            NumberParam::Other(value) => value.to_string(),
        };
        GapfillError::invalid(name, raw)
    }
}

fn whole_number(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}

#[derive(Debug, Default, Deserialize)]
struct LegacyRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LegacyResponse {
    result: String,
}

#[derive(Debug, Serialize)]
struct VariationsPayload {
    default: &'static str,
    variations: Vec<VariationInfo>,
}

#[derive(Debug, Serialize)]
struct VariationInfo {
    name: &'static str,
    parameters: &'static [&'static str],
    random: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TaggerError, Token};
    use axum::{
        body,
        body::Body,
        http::{Request, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router() -> Router {
        build_router(Arc::new(AppState::default()))
    }

    async fn post_json(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn generate_every_other_word() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "The quick brown fox jumps", "variation_type": "EVERY_OTHER_WORD" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["blanked_text"], "The q____ brown fox j____");
        assert_eq!(payload["first_letter_clues"], "The q brown fox j");
    }

    #[tokio::test]
    async fn generate_difficulty_level_four() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "Cats", "variation_type": "DIFFICULTY_LEVEL_BLANKS", "difficulty_level": 4 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["blanked_text"], "C___");
        assert_eq!(payload["first_letter_clues"], "C");
    }

    #[tokio::test]
    async fn default_variation_blanks_all_candidates() {
        let (status, payload) =
            post_json(test_router(), "/generate", json!({ "text": "Rivers carry water" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["blanked_text"], "R_____ c____ w____");
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        for body in [json!({ "text": "" }), json!({ "text": "   " }), json!({})] {
            let (status, payload) = post_json(test_router(), "/generate", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(payload, json!({ "error": "text is required" }));
        }
    }

    #[tokio::test]
    async fn unknown_variation_is_rejected() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "Cats", "variation_type": "NOT_REAL" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload, json!({ "error": "Unknown variation_type: NOT_REAL" }));
    }

    #[tokio::test]
    async fn malformed_numbers_are_rejected() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "Cats", "variation_type": "RANDOM_BLANKS", "blank_ratio": "lots" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "invalid blank_ratio: lots");

        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "Cats", "difficulty_level": [4] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "invalid difficulty_level: [4]");
    }

    #[tokio::test]
    async fn numeric_strings_are_accepted() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({ "text": "Cats", "variation_type": "DIFFICULTY_LEVEL_BLANKS", "difficulty_level": "4", "seed": "9" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["blanked_text"], "C___");
    }

    #[tokio::test]
    async fn whole_float_seeds_match_integer_seeds() {
        let text = "Glaciers slowly carved valleys while rivers deposited gravel across northern plains";
        let request = |seed: Value| {
            json!({ "text": text, "variation_type": "RANDOM_BLANKS", "seed": seed })
        };
        let (status, by_int) = post_json(test_router(), "/generate", request(json!(1234))).await;
        assert_eq!(status, StatusCode::OK);
        for seed in [json!(1234.0), json!("1234.0"), json!("1234")] {
            let (status, payload) = post_json(test_router(), "/generate", request(seed)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(payload, by_int);
        }
        let (status, payload) = post_json(test_router(), "/generate", request(json!(2.5))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "invalid seed: 2.5");
    }

    #[test]
    fn request_fields_land_in_matching_params() {
        let request: GenerateRequest = serde_json::from_value(json!({
            "text": "Cats",
            "variation_type": "INCREASING_DIFFICULTY",
            "blank_ratio": 0.1,
            "base_blank_ratio": 0.2,
            "step": 0.3,
            "attempt_number": 4,
            "max_blank_ratio": 0.9,
            "difficulty_level": 3,
            "seed": 77,
        }))
        .unwrap();
        let (text, parts) = request.into_parts().unwrap();
        assert_eq!(text, "Cats");
        assert_eq!(parts.variation, Variation::IncreasingDifficulty);
        assert_eq!(parts.seed, Some(77));
        assert_eq!(
            parts.params,
            VariationParams {
                blank_ratio: Some(0.1),
                base_blank_ratio: 0.2,
                step: 0.3,
                attempt_number: 4,
                max_blank_ratio: 0.9,
                difficulty_level: 3,
            }
        );
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let request: GenerateRequest = serde_json::from_value(json!({ "text": "Cats" })).unwrap();
        let (_, parts) = request.into_parts().unwrap();
        assert_eq!(parts.variation, Variation::AllBlankFirstLetters);
        assert_eq!(parts.params, VariationParams::default());
        assert_eq!(parts.seed, None);
    }

    #[tokio::test]
    async fn late_attempts_blank_everything_when_ceiling_is_one() {
        let (status, payload) = post_json(
            test_router(),
            "/generate",
            json!({
                "text": "Rivers carry water",
                "variation_type": "INCREASING_DIFFICULTY",
                "attempt_number": 6,
                "max_blank_ratio": 1.0,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["blanked_text"], "R_____ c____ w____");
        assert_eq!(payload["first_letter_clues"], "R c w");
    }

    #[tokio::test]
    async fn seeded_random_blanks_repeat() {
        let body = json!({
            "text": "Glaciers slowly carved valleys while rivers deposited gravel across northern plains",
            "variation_type": "RANDOM_BLANKS",
            "blank_ratio": 0.5,
            "seed": 1234,
        });
        let (_, first) = post_json(test_router(), "/generate", body.clone()).await;
        let (_, second) = post_json(test_router(), "/generate", body).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_json_is_a_bad_request() {
        let response = test_router()
            .oneshot(
                Request::post("/generate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tagger_failure_is_a_server_error() {
        struct BrokenTagger;
        impl Tagger for BrokenTagger {
            fn tag(&self, _text: &str) -> Result<Vec<Token>, TaggerError> {
                Err(TaggerError::new("model unavailable"))
            }
            fn name(&self) -> &'static str {
                "broken"
            }
        }
        let router = build_router(Arc::new(AppState::with_tagger(Arc::new(BrokenTagger))));
        let (status, payload) = post_json(router, "/generate", json!({ "text": "Cats" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload["error"], "tagger failed: model unavailable");
    }

    #[tokio::test]
    async fn legacy_blank_route() {
        let (status, payload) =
            post_json(test_router(), "/blank", json!({ "text": "The cat sat." })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload, json!({ "result": "The c__ s__ ." }));
    }

    #[tokio::test]
    async fn variations_are_listed() {
        let response = test_router()
            .oneshot(Request::get("/api/variations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["default"], "ALL_BLANK_FIRST_LETTERS");
        assert_eq!(payload["variations"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = test_router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
