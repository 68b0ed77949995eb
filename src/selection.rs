//! Candidate filtering and the six blanking policies.
//!
//! Blank sets are sets of token positions: two tokens with the same text are
//! still distinct members.

use rand::Rng;
use rand::seq::index;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::GapfillError;
use crate::token::Token;

const MIN_CANDIDATE_CHARS: usize = 4;

pub const DEFAULT_BLANK_RATIO: f64 = 0.40;
pub const DEFAULT_BASE_BLANK_RATIO: f64 = 0.30;
pub const DEFAULT_STEP: f64 = 0.15;
pub const DEFAULT_MAX_BLANK_RATIO: f64 = 0.85;
pub const DEFAULT_ATTEMPT: i64 = 1;
pub const DEFAULT_DIFFICULTY_LEVEL: i64 = 1;

/// A token can be blanked when it is plain ASCII letters, at least four long,
/// and not a stop word.
pub fn is_eligible(token: &Token) -> bool {
    !token.is_stop
        && token.text.len() >= MIN_CANDIDATE_CHARS
        && token.text.bytes().all(|byte| byte.is_ascii_alphabetic())
}

/// Positions of every eligible token, in document order.
pub fn candidates(doc: &[Token]) -> Vec<usize> {
    doc.iter()
        .enumerate()
        .filter(|(_, token)| is_eligible(token))
        .map(|(position, _)| position)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variation {
    #[default]
    AllBlankFirstLetters,
    RandomBlanks,
    KeyTermsOnly,
    EveryOtherWord,
    IncreasingDifficulty,
    DifficultyLevelBlanks,
}

impl Variation {
    pub const ALL: [Variation; 6] = [
        Variation::AllBlankFirstLetters,
        Variation::RandomBlanks,
        Variation::KeyTermsOnly,
        Variation::EveryOtherWord,
        Variation::IncreasingDifficulty,
        Variation::DifficultyLevelBlanks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variation::AllBlankFirstLetters => "ALL_BLANK_FIRST_LETTERS",
            Variation::RandomBlanks => "RANDOM_BLANKS",
            Variation::KeyTermsOnly => "KEY_TERMS_ONLY",
            Variation::EveryOtherWord => "EVERY_OTHER_WORD",
            Variation::IncreasingDifficulty => "INCREASING_DIFFICULTY",
            Variation::DifficultyLevelBlanks => "DIFFICULTY_LEVEL_BLANKS",
        }
    }

    /// Request parameters this variation reads.
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Variation::AllBlankFirstLetters
            | Variation::KeyTermsOnly
            | Variation::EveryOtherWord => &[],
            Variation::RandomBlanks => &["blank_ratio", "seed"],
            Variation::IncreasingDifficulty => &[
                "blank_ratio",
                "base_blank_ratio",
                "step",
                "attempt_number",
                "max_blank_ratio",
                "seed",
            ],
            Variation::DifficultyLevelBlanks => &["difficulty_level", "seed"],
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(
            self,
            Variation::RandomBlanks
                | Variation::IncreasingDifficulty
                | Variation::DifficultyLevelBlanks
        )
    }
}

impl FromStr for Variation {
    type Err = GapfillError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Variation::ALL
            .into_iter()
            .find(|variation| variation.as_str() == value)
            .ok_or_else(|| GapfillError::UnknownVariation(value.to_string()))
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariationParams {
    pub blank_ratio: Option<f64>,
    pub base_blank_ratio: f64,
    pub step: f64,
    pub attempt_number: i64,
    pub max_blank_ratio: f64,
    pub difficulty_level: i64,
}

impl Default for VariationParams {
    fn default() -> Self {
        Self {
            blank_ratio: None,
            base_blank_ratio: DEFAULT_BASE_BLANK_RATIO,
            step: DEFAULT_STEP,
            attempt_number: DEFAULT_ATTEMPT,
            max_blank_ratio: DEFAULT_MAX_BLANK_RATIO,
            difficulty_level: DEFAULT_DIFFICULTY_LEVEL,
        }
    }
}

impl VariationParams {
    /// Rejects non-finite ratios; JSON cannot carry them but parsed strings can.
    pub fn validate(&self) -> Result<(), GapfillError> {
        let ratios = [
            ("blank_ratio", self.blank_ratio.unwrap_or(DEFAULT_BLANK_RATIO)),
            ("base_blank_ratio", self.base_blank_ratio),
            ("step", self.step),
            ("max_blank_ratio", self.max_blank_ratio),
        ];
        for (name, value) in ratios {
            if !value.is_finite() {
                return Err(GapfillError::invalid(name, value.to_string()));
            }
        }
        Ok(())
    }

    pub fn random_ratio(&self) -> f64 {
        self.blank_ratio
            .unwrap_or(DEFAULT_BLANK_RATIO)
            .clamp(0.0, 1.0)
    }

    pub fn progressive_ratio(&self) -> f64 {
        let ceiling = self.max_blank_ratio.clamp(0.0, 1.0);
        let attempt = self.attempt_number.max(1);
        let ratio = self
            .blank_ratio
            .unwrap_or_else(|| self.base_blank_ratio + self.step * (attempt - 1) as f64);
        ratio.clamp(0.0, ceiling)
    }

    pub fn level_ratio(&self) -> f64 {
        match self.difficulty_level {
            2 => 0.50,
            3 => 0.75,
            4 => 1.00,
            _ => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VariationRequest {
    pub variation: Variation,
    pub params: VariationParams,
    pub seed: Option<u64>,
}

impl VariationRequest {
    pub fn new(variation: Variation) -> Self {
        Self {
            variation,
            ..Self::default()
        }
    }
}

/// Picks the blank set for `variation`. `candidates` must be the output of
/// [`candidates`] for the same `doc`.
pub fn select<R: Rng + ?Sized>(
    doc: &[Token],
    candidates: &[usize],
    variation: Variation,
    params: &VariationParams,
    rng: &mut R,
) -> BTreeSet<usize> {
    match variation {
        Variation::AllBlankFirstLetters => candidates.iter().copied().collect(),
        Variation::RandomBlanks => sample(candidates, params.random_ratio(), rng),
        Variation::KeyTermsOnly => doc
            .iter()
            .enumerate()
            .filter(|(_, token)| is_eligible(token) && (token.pos.is_nominal() || token.has_entity()))
            .map(|(position, _)| position)
            .collect(),
        Variation::EveryOtherWord => candidates.iter().step_by(2).copied().collect(),
        Variation::IncreasingDifficulty => {
            let ratio = params.progressive_ratio();
            if ratio >= 1.0 {
                candidates.iter().copied().collect()
            } else {
                sample(candidates, ratio, rng)
            }
        }
        Variation::DifficultyLevelBlanks => sample(candidates, params.level_ratio(), rng),
    }
}

/// `max(1, floor(n * ratio))`, capped at `n`; zero only when `n` is zero.
pub fn sample_size(candidate_count: usize, ratio: f64) -> usize {
    if candidate_count == 0 {
        return 0;
    }
    let scaled = (candidate_count as f64 * ratio).floor() as usize;
    scaled.clamp(1, candidate_count)
}

fn sample<R: Rng + ?Sized>(candidates: &[usize], ratio: f64, rng: &mut R) -> BTreeSet<usize> {
    let amount = sample_size(candidates.len(), ratio);
    if amount == 0 {
        return BTreeSet::new();
    }
    index::sample(rng, candidates.len(), amount)
        .into_iter()
        .map(|slot| candidates[slot])
        .collect()
}
