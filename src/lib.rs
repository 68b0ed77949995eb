mod error;
pub mod render;
pub mod selection;
mod stopwords;
pub mod tagger;
pub mod token;
#[cfg(feature = "web")]
pub mod web;

pub use error::GapfillError;
pub use render::{BLANK_CHAR, Exercise, render, render_legacy};
pub use selection::{Variation, VariationParams, VariationRequest, candidates, is_eligible, select};
pub use stopwords::is_stop_word;
pub use tagger::{RuleTagger, Tagger, TaggerError};
pub use token::{PartOfSpeech, Token};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A rendered exercise together with the counts that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub exercise: Exercise,
    pub candidate_count: usize,
    pub blank_count: usize,
}

/// Runs tagging, candidate selection, and rendering for one request.
///
/// The random generator lives only for this call: seeded from
/// `request.seed` when present, otherwise from OS entropy.
pub fn generate(
    tagger: &dyn Tagger,
    text: &str,
    request: &VariationRequest,
) -> Result<Generated, GapfillError> {
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    generate_with_rng(tagger, text, request, &mut rng)
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    tagger: &dyn Tagger,
    text: &str,
    request: &VariationRequest,
    rng: &mut R,
) -> Result<Generated, GapfillError> {
    if text.trim().is_empty() {
        return Err(GapfillError::MissingText);
    }
    request.params.validate()?;
    let doc = tagger.tag(text)?;
    let pool = candidates(&doc);
    let blanks = select(&doc, &pool, request.variation, &request.params, rng);
    Ok(Generated {
        exercise: render(&doc, &blanks),
        candidate_count: pool.len(),
        blank_count: blanks.len(),
    })
}

/// The older single-policy endpoint: mask every non-stop token.
pub fn generate_legacy(tagger: &dyn Tagger, text: &str) -> Result<String, GapfillError> {
    if text.trim().is_empty() {
        return Err(GapfillError::MissingText);
    }
    let doc = tagger.tag(text)?;
    Ok(render_legacy(&doc))
}
