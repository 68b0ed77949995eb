use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::token::{PartOfSpeech, Token};

pub const BLANK_CHAR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub blanked_text: String,
    pub first_letter_clues: String,
}

/// Rebuilds the document twice: once with blanked tokens masked after their
/// first letter, once with blanked tokens cut down to that letter.
pub fn render(doc: &[Token], blanks: &BTreeSet<usize>) -> Exercise {
    let mut blanked = String::new();
    let mut clues = String::new();
    for (position, token) in doc.iter().enumerate() {
        if blanks.contains(&position) {
            let mut chars = token.text.chars();
            if let Some(first) = chars.next() {
                blanked.push(first);
                blanked.extend(chars.map(|_| BLANK_CHAR));
                clues.push(first);
            }
        } else {
            blanked.push_str(&token.text);
            clues.push_str(&token.text);
        }
        blanked.push_str(&token.whitespace);
        clues.push_str(&token.whitespace);
    }
    Exercise {
        blanked_text: blanked.trim().to_string(),
        first_letter_clues: clues.trim().to_string(),
    }
}

/// Masks every non-stop token and joins tokens with single spaces.
///
/// This is the output of the older `/blank` endpoint; it ignores the
/// eligibility rules. One trailing space belongs to its token; any other
/// whitespace run becomes a separate whitespace token, which is masked like
/// a word, so `"a  b"` renders as `"a   b"`.
pub fn render_legacy(doc: &[Token]) -> String {
    let mut pieces = Vec::with_capacity(doc.len());
    for token in doc {
        if token.pos == PartOfSpeech::Space {
            pieces.push(mask(&format!("{}{}", token.text, token.whitespace)));
            continue;
        }
        pieces.push(if token.is_stop {
            token.text.clone()
        } else {
            mask(&token.text)
        });
        let extra = token
            .whitespace
            .strip_prefix(' ')
            .unwrap_or(&token.whitespace);
        if !extra.is_empty() {
            pieces.push(mask(extra));
        }
    }
    pieces.join(" ")
}

fn mask(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => std::iter::once(first)
            .chain(chars.map(|_| BLANK_CHAR))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Vec<Token> {
        vec![
            Token::new("The", PartOfSpeech::Det).with_whitespace(" ").stop(),
            Token::new("quick", PartOfSpeech::Adj).with_whitespace(" "),
            Token::new("brown", PartOfSpeech::Adj).with_whitespace(" "),
            Token::new("fox", PartOfSpeech::Noun).with_whitespace(" "),
            Token::new("jumps", PartOfSpeech::Verb),
            Token::new(".", PartOfSpeech::Punct).with_whitespace("\n"),
        ]
    }

    #[test]
    fn masks_blanked_tokens_only() {
        let blanks = BTreeSet::from([1, 4]);
        let exercise = render(&doc(), &blanks);
        assert_eq!(exercise.blanked_text, "The q____ brown fox j____.");
        assert_eq!(exercise.first_letter_clues, "The q brown fox j.");
    }

    #[test]
    fn empty_blank_set_reproduces_trimmed_input() {
        let exercise = render(&doc(), &BTreeSet::new());
        assert_eq!(exercise.blanked_text, "The quick brown fox jumps.");
        assert_eq!(exercise.first_letter_clues, exercise.blanked_text);
    }

    #[test]
    fn masking_counts_characters_not_bytes() {
        let doc = vec![Token::new("Ärger", PartOfSpeech::Noun)];
        let exercise = render(&doc, &BTreeSet::from([0]));
        assert_eq!(exercise.blanked_text, "Ä____");
        assert_eq!(exercise.first_letter_clues, "Ä");
    }

    #[test]
    fn legacy_output_joins_with_spaces() {
        assert_eq!(render_legacy(&doc()), "The q____ b____ f__ j____ . \n");
    }

    #[test]
    fn legacy_output_keeps_extra_whitespace_as_tokens() {
        let doc = vec![
            Token::new("a", PartOfSpeech::Det).with_whitespace("  ").stop(),
            Token::new("dog", PartOfSpeech::Noun).with_whitespace("\n"),
            Token::new("barks", PartOfSpeech::Verb),
        ];
        assert_eq!(render_legacy(&doc), "a   d__ \n b____");
    }
}
