use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal part-of-speech tags, plus `SPACE` for whitespace-only tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartOfSpeech {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    Space,
    X,
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Adj => "ADJ",
            PartOfSpeech::Adp => "ADP",
            PartOfSpeech::Adv => "ADV",
            PartOfSpeech::Aux => "AUX",
            PartOfSpeech::Cconj => "CCONJ",
            PartOfSpeech::Det => "DET",
            PartOfSpeech::Intj => "INTJ",
            PartOfSpeech::Noun => "NOUN",
            PartOfSpeech::Num => "NUM",
            PartOfSpeech::Part => "PART",
            PartOfSpeech::Pron => "PRON",
            PartOfSpeech::Propn => "PROPN",
            PartOfSpeech::Punct => "PUNCT",
            PartOfSpeech::Sconj => "SCONJ",
            PartOfSpeech::Sym => "SYM",
            PartOfSpeech::Verb => "VERB",
            PartOfSpeech::Space => "SPACE",
            PartOfSpeech::X => "X",
        }
    }

    /// Nouns and proper nouns count as key terms.
    pub fn is_nominal(&self) -> bool {
        matches!(self, PartOfSpeech::Noun | PartOfSpeech::Propn)
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tagged unit of a parsed document.
///
/// Concatenating `text` and `whitespace` over the whole document reproduces
/// the source text, so tokens are never reordered or dropped once tagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub whitespace: String,
    pub is_stop: bool,
    pub pos: PartOfSpeech,
    pub entity: Option<String>,
}

impl Token {
    pub fn new(text: impl Into<String>, pos: PartOfSpeech) -> Self {
        Self {
            text: text.into(),
            whitespace: String::new(),
            is_stop: false,
            pos,
            entity: None,
        }
    }

    pub fn with_whitespace(mut self, whitespace: impl Into<String>) -> Self {
        self.whitespace = whitespace.into();
        self
    }

    pub fn stop(mut self) -> Self {
        self.is_stop = true;
        self
    }

    pub fn with_entity(mut self, label: impl Into<String>) -> Self {
        self.entity = Some(label.into());
        self
    }

    pub fn is_alpha(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(char::is_alphabetic)
    }

    pub fn has_entity(&self) -> bool {
        self.entity.as_deref().is_some_and(|label| !label.is_empty())
    }
}
