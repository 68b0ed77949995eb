use std::fmt;

use crate::tagger::TaggerError;

#[derive(Debug)]
pub enum GapfillError {
    MissingText,
    InvalidParameter { name: &'static str, value: String },
    UnknownVariation(String),
    Tagger(TaggerError),
}

impl GapfillError {
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        GapfillError::InvalidParameter {
            name,
            value: value.into(),
        }
    }

    /// Errors caused by the caller's input rather than by the tagger.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, GapfillError::Tagger(_))
    }
}

impl fmt::Display for GapfillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapfillError::MissingText => write!(f, "text is required"),
            GapfillError::InvalidParameter { name, value } => {
                write!(f, "invalid {name}: {value}")
            }
            GapfillError::UnknownVariation(value) => {
                write!(f, "Unknown variation_type: {value}")
            }
            GapfillError::Tagger(err) => write!(f, "tagger failed: {err}"),
        }
    }
}

impl std::error::Error for GapfillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GapfillError::Tagger(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaggerError> for GapfillError {
    fn from(value: TaggerError) -> Self {
        GapfillError::Tagger(value)
    }
}
