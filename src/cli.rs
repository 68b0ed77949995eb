use std::error::Error;
use std::io::{self, Read};

use atty::Stream;
use clap::{Args, Parser, Subcommand};
use gapfill_rs::{
    Generated, RuleTagger, Tagger, Token, Variation, VariationParams, VariationRequest,
    candidates, selection,
};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

#[derive(Parser, Debug)]
#[command(
    name = "gapfill-rs",
    about = "Generate fill-in-the-blank exercises",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Blank words in a passage.
    Generate {
        /// Passage to blank; read from stdin when omitted.
        text: Option<String>,
        #[command(flatten)]
        options: GenerateOptions,
    },
    /// Show the tokens the tagger produces for a passage.
    Tag {
        /// Passage to tag; read from stdin when omitted.
        text: Option<String>,
    },
    /// List the supported variation types.
    Variations,
    /// Run the HTTP service.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, env = "GAPFILL_ADDR", default_value = "127.0.0.1:6000")]
        addr: std::net::SocketAddr,
    },
}

#[derive(Args, Debug)]
struct GenerateOptions {
    /// Variation type, e.g. RANDOM_BLANKS.
    #[arg(short, long, default_value = "ALL_BLANK_FIRST_LETTERS")]
    variation: String,
    /// Share of candidates to blank (RANDOM_BLANKS, INCREASING_DIFFICULTY).
    #[arg(long)]
    blank_ratio: Option<f64>,
    /// Seed for reproducible random selection.
    #[arg(long)]
    seed: Option<u64>,
    /// Attempt number for INCREASING_DIFFICULTY.
    #[arg(long, default_value_t = selection::DEFAULT_ATTEMPT)]
    attempt: i64,
    /// Starting ratio for INCREASING_DIFFICULTY.
    #[arg(long, default_value_t = selection::DEFAULT_BASE_BLANK_RATIO)]
    base_ratio: f64,
    /// Ratio added per attempt for INCREASING_DIFFICULTY.
    #[arg(long, default_value_t = selection::DEFAULT_STEP)]
    step: f64,
    /// Upper bound for INCREASING_DIFFICULTY.
    #[arg(long, default_value_t = selection::DEFAULT_MAX_BLANK_RATIO)]
    max_ratio: f64,
    /// Level 1-4 for DIFFICULTY_LEVEL_BLANKS.
    #[arg(short, long, default_value_t = selection::DEFAULT_DIFFICULTY_LEVEL)]
    level: i64,
}

impl GenerateOptions {
    fn to_request(&self) -> Result<VariationRequest, Box<dyn Error>> {
        Ok(VariationRequest {
            variation: self.variation.parse::<Variation>()?,
            params: VariationParams {
                blank_ratio: self.blank_ratio,
                base_blank_ratio: self.base_ratio,
                step: self.step,
                attempt_number: self.attempt,
                max_blank_ratio: self.max_ratio,
                difficulty_level: self.level,
            },
            seed: self.seed,
        })
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate { text, options } => handle_generate(text, &options, cli.json),
        Command::Tag { text } => handle_tag(text, cli.json),
        Command::Variations => handle_variations(cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr } => handle_serve(addr),
    }
}

fn read_text(text: Option<String>) -> Result<String, Box<dyn Error>> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn handle_generate(
    text: Option<String>,
    options: &GenerateOptions,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let text = read_text(text)?;
    let request = options.to_request()?;
    let generated = gapfill_rs::generate(&RuleTagger, &text, &request)?;

    if as_json {
        let payload = json!({
            "variation_type": request.variation.as_str(),
            "candidates": generated.candidate_count,
            "blanks": generated.blank_count,
            "blanked_text": generated.exercise.blanked_text,
            "first_letter_clues": generated.exercise.first_letter_clues,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_exercise(request.variation, &generated);
    }
    Ok(())
}

fn handle_tag(text: Option<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    let text = read_text(text)?;
    let tokens = RuleTagger.tag(&text)?;
    let pool = candidates(&tokens);

    if as_json {
        let payload: Vec<_> = tokens
            .iter()
            .enumerate()
            .map(|(position, token)| {
                json!({
                    "text": token.text,
                    "whitespace": token.whitespace,
                    "is_stop": token.is_stop,
                    "pos": token.pos,
                    "entity": token.entity,
                    "is_alpha": token.is_alpha(),
                    "candidate": pool.contains(&position),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_token_table(&tokens, &pool);
    }
    Ok(())
}

fn handle_variations(as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload: Vec<_> = Variation::ALL
            .iter()
            .map(|variation| {
                json!({
                    "name": variation.as_str(),
                    "parameters": variation.parameters(),
                    "random": variation.is_random(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let width = Variation::ALL
        .iter()
        .map(|variation| variation.as_str().len())
        .max()
        .unwrap_or(9)
        .max("VARIATION".len());
    println!("{:<width$}  {}", "VARIATION", "PARAMETERS", width = width);
    println!("{:-<width$}  {}", "", "----------", width = width);
    for variation in Variation::ALL {
        let params = variation.parameters();
        let params = if params.is_empty() {
            "-".to_string()
        } else {
            params.join(", ")
        };
        println!("{:<width$}  {}", variation.as_str(), params, width = width);
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    use gapfill_rs::web::{self, WebConfig};

    web::init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::serve(WebConfig { addr }))?;
    Ok(())
}

fn print_exercise(variation: Variation, generated: &Generated) {
    let body = format!(
        "**{variation}** ({blanks} of {candidates} candidates blanked)\n\n{blanked}\n\n*Clues:* {clues}\n",
        blanks = generated.blank_count,
        candidates = generated.candidate_count,
        blanked = escape_markdown(&generated.exercise.blanked_text),
        clues = escape_markdown(&generated.exercise.first_letter_clues),
    );
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, &body, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{}", generated.exercise.blanked_text);
        println!("{}", generated.exercise.first_letter_clues);
    }
}

fn print_token_table(tokens: &[Token], pool: &[usize]) {
    if tokens.is_empty() {
        println!("No tokens.");
        return;
    }
    let width = tokens
        .iter()
        .map(|token| token.text.chars().count())
        .max()
        .unwrap_or(4)
        .max("TOKEN".len());
    println!(
        "{:<width$}  {:<5}  {:<5}  {:<9}  {}",
        "TOKEN",
        "POS",
        "STOP",
        "CANDIDATE",
        "ENTITY",
        width = width
    );
    println!(
        "{:-<width$}  {:-<5}  {:-<5}  {:-<9}  {}",
        "",
        "",
        "",
        "",
        "------",
        width = width
    );
    for (position, token) in tokens.iter().enumerate() {
        println!(
            "{:<width$}  {:<5}  {:<5}  {:<9}  {}",
            token.text.escape_debug().to_string(),
            token.pos.as_str(),
            token.is_stop,
            pool.binary_search(&position).is_ok(),
            token.entity.as_deref().unwrap_or("-"),
            width = width
        );
    }
}

/// Underscores would otherwise read as emphasis markers.
fn escape_markdown(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('*', "\\*")
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_options_build_request() {
        let cli = Cli::parse_from([
            "gapfill-rs",
            "generate",
            "Cats",
            "--variation",
            "DIFFICULTY_LEVEL_BLANKS",
            "--level",
            "4",
            "--seed",
            "3",
        ]);
        let Command::Generate { text, options } = cli.command else {
            panic!("expected generate command");
        };
        assert_eq!(text.as_deref(), Some("Cats"));
        let request = options.to_request().unwrap();
        assert_eq!(request.variation, Variation::DifficultyLevelBlanks);
        assert_eq!(request.params.difficulty_level, 4);
        assert_eq!(request.seed, Some(3));
    }

    #[test]
    fn unknown_variation_fails() {
        let cli = Cli::parse_from(["gapfill-rs", "generate", "Cats", "-v", "NOT_REAL"]);
        let Command::Generate { options, .. } = cli.command else {
            panic!("expected generate command");
        };
        let err = options.to_request().unwrap_err();
        assert_eq!(err.to_string(), "Unknown variation_type: NOT_REAL");
    }

    #[test]
    fn markdown_escaping_protects_blanks() {
        assert_eq!(escape_markdown("q____ *x*"), "q\\_\\_\\_\\_ \\*x\\*");
    }
}
