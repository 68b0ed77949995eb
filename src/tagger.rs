//! Tokenization and tagging.
//!
//! The rest of the crate only sees the [`Tagger`] trait, so a real NLP
//! backend can replace [`RuleTagger`] without touching selection or rendering.
//! `RuleTagger` segments on Unicode word boundaries and annotates tokens with
//! a stop-word list, small word lists for common verbs, adjectives and
//! adverbs, suffix rules, and the tag of the preceding word.

use std::fmt;

use unicode_segmentation::UnicodeSegmentation;

use crate::stopwords::is_stop_word;
use crate::token::{PartOfSpeech, Token};

pub trait Tagger: Send + Sync {
    /// Splits `text` into an ordered, annotated token sequence.
    fn tag(&self, text: &str) -> Result<Vec<Token>, TaggerError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug)]
pub struct TaggerError {
    message: String,
}

impl TaggerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TaggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TaggerError {}

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];
const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "each", "every", "either", "neither",
    "some", "any", "no", "another", "all", "both",
];
const PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "you", "your", "yours", "yourself", "yourselves", "he",
    "him", "his", "himself", "she", "her", "hers", "herself", "it", "its", "itself", "we",
    "us", "our", "ours", "ourselves", "they", "them", "their", "themselves", "who", "whom",
    "whose", "what", "which", "someone", "something", "anyone", "anything", "everyone",
    "everything", "nobody", "nothing", "none",
];
const ADPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "among", "amongst", "around",
    "at", "before", "behind", "below", "beside", "besides", "between", "beyond", "by",
    "during", "except", "for", "from", "in", "into", "of", "off", "on", "onto", "over", "per",
    "through", "throughout", "thru", "to", "toward", "towards", "under", "upon", "via", "with",
    "within", "without",
];
const CONJUNCTIONS: &[&str] = &["and", "or", "but", "nor", "yet", "so"];
const SUBORDINATORS: &[&str] = &[
    "although", "because", "if", "since", "though", "unless", "until", "whereas", "whether",
    "while", "once", "as",
];
const AUXILIARIES: &[&str] = &[
    "am", "is", "are", "was", "were", "be", "been", "being", "do", "does", "did", "have", "has",
    "had", "can", "could", "may", "might", "must", "shall", "should", "will", "would", "ca",
];
const POSSESSIVES: &[&str] = &["my", "your", "his", "her", "its", "our", "their", "whose"];

// Base forms; `-s`/`-es`/`-ies` inflections are matched too.
const VERBS: &[&str] = &[
    "accept", "add", "agree", "allow", "appear", "apply", "arrive", "ask", "begin", "believe",
    "bring", "build", "buy", "carry", "catch", "change", "choose", "climb", "close", "come",
    "consider", "continue", "cook", "cost", "create", "cry", "cut", "decide", "describe",
    "destroy", "develop", "die", "drink", "drive", "eat", "enjoy", "enter", "explain", "fall",
    "feel", "fight", "find", "fly", "follow", "forget", "gather", "grow", "happen", "hear",
    "help", "hide", "hold", "hope", "hunt", "improve", "include", "jump", "kill", "know",
    "learn", "leave", "let", "lie", "like", "listen", "live", "look", "lose", "love", "marry",
    "mean", "meet", "need", "offer", "open", "pay", "play", "prefer", "prepare", "produce",
    "protect", "provide", "pull", "push", "reach", "read", "receive", "remain", "remember",
    "require", "return", "ride", "rise", "run", "sell", "send", "serve", "shine", "shout",
    "sing", "sink", "sit", "sleep", "speak", "spend", "stand", "start", "stay", "steal", "stop",
    "study", "succeed", "suggest", "swim", "talk", "teach", "tell", "think", "throw", "travel",
    "try", "turn", "understand", "visit", "wait", "walk", "want", "wash", "watch", "win",
    "wish", "wonder", "work", "worry", "write",
];
const ADJECTIVES: &[&str] = &[
    "bad", "big", "black", "blue", "bright", "brown", "clean", "clear", "cold", "dark", "deep",
    "dry", "early", "easy", "fair", "false", "fine", "free", "fresh", "good", "great", "green",
    "happy", "hard", "heavy", "high", "hot", "huge", "large", "late", "lazy", "light", "little",
    "long", "loud", "low", "narrow", "new", "nice", "old", "poor", "quick", "quiet", "real",
    "red", "rich", "round", "sad", "short", "simple", "slow", "small", "soft", "strong", "sweet",
    "tall", "thick", "thin", "tiny", "true", "warm", "weak", "wet", "white", "wide", "wild",
    "wise", "wrong", "yellow", "young",
];
const ADVERBS: &[&str] = &[
    "abroad", "ahead", "almost", "away", "fast", "forward", "instead", "maybe", "seldom", "soon",
    "today", "tomorrow", "tonight", "yesterday",
];

/// Heuristic English tagger: word-boundary segmentation, stop-word flags,
/// suffix-based part of speech, and capitalization-based entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTagger;

impl Tagger for RuleTagger {
    fn tag(&self, text: &str) -> Result<Vec<Token>, TaggerError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut sentence_start = true;
        let mut previous: Option<Context> = None;
        for segment in text.split_word_bounds() {
            if segment.chars().all(char::is_whitespace) {
                match tokens.last_mut() {
                    Some(last) => last.whitespace.push_str(segment),
                    None => tokens.push(Token::new(segment, PartOfSpeech::Space)),
                }
                continue;
            }
            let token = annotate(segment, sentence_start, previous.as_ref());
            sentence_start = ends_sentence(segment);
            previous = Some(Context {
                pos: token.pos,
                lower: segment.to_lowercase(),
            });
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn name(&self) -> &'static str {
        "rule"
    }
}

/// The word to the left of the one being tagged.
struct Context {
    pos: PartOfSpeech,
    lower: String,
}

impl Context {
    /// Positions where an unknown open-class word is most likely a noun.
    fn expects_noun(&self) -> bool {
        matches!(
            self.pos,
            PartOfSpeech::Det
                | PartOfSpeech::Adj
                | PartOfSpeech::Num
                | PartOfSpeech::Adp
                | PartOfSpeech::Verb
        ) && self.lower != "to"
            || POSSESSIVES.contains(&self.lower.as_str())
    }

    /// A subject pronoun, auxiliary or infinitive `to` tends to precede a verb.
    fn expects_verb(&self) -> bool {
        (self.pos == PartOfSpeech::Pron && !POSSESSIVES.contains(&self.lower.as_str()))
            || self.pos == PartOfSpeech::Aux
            || self.lower == "to"
    }
}

fn annotate(segment: &str, sentence_start: bool, previous: Option<&Context>) -> Token {
    let lower = segment.to_lowercase();
    let is_stop = is_stop_word(&lower);
    let is_alpha = segment.chars().all(char::is_alphabetic);
    let capitalized = segment.chars().next().is_some_and(char::is_uppercase);

    let mut token = if is_stop {
        Token::new(segment, closed_class(&lower)).stop()
    } else if is_alpha {
        Token::new(
            segment,
            open_class(&lower, capitalized && !sentence_start, previous),
        )
    } else if is_numeric(segment) {
        Token::new(segment, PartOfSpeech::Num).with_entity("CARDINAL")
    } else if segment.chars().all(|ch| ch.is_ascii_punctuation()) {
        let pos = if segment.chars().all(|ch| "$%&+<=>^|~#@*".contains(ch)) {
            PartOfSpeech::Sym
        } else {
            PartOfSpeech::Punct
        };
        Token::new(segment, pos)
    } else {
        Token::new(segment, PartOfSpeech::X)
    };

    if is_alpha && capitalized {
        if MONTHS.contains(&lower.as_str()) || WEEKDAYS.contains(&lower.as_str()) {
            token.pos = PartOfSpeech::Propn;
            token.entity = Some("DATE".to_string());
        } else if !is_stop && !sentence_start {
            token.entity = Some("NAME".to_string());
        }
    }
    token
}

fn closed_class(lower: &str) -> PartOfSpeech {
    if DETERMINERS.contains(&lower) {
        PartOfSpeech::Det
    } else if PRONOUNS.contains(&lower) {
        PartOfSpeech::Pron
    } else if AUXILIARIES.contains(&lower) {
        PartOfSpeech::Aux
    } else if ADPOSITIONS.contains(&lower) {
        PartOfSpeech::Adp
    } else if CONJUNCTIONS.contains(&lower) {
        PartOfSpeech::Cconj
    } else if SUBORDINATORS.contains(&lower) {
        PartOfSpeech::Sconj
    } else if lower.starts_with('\'') || lower == "n't" || lower == "not" {
        PartOfSpeech::Part
    } else {
        PartOfSpeech::Adv
    }
}

fn open_class(lower: &str, proper: bool, previous: Option<&Context>) -> PartOfSpeech {
    if proper {
        return PartOfSpeech::Propn;
    }
    if ADVERBS.contains(&lower) {
        return PartOfSpeech::Adv;
    }
    if ADJECTIVES.contains(&lower) {
        return PartOfSpeech::Adj;
    }
    if let Some(pos) = suffix_class(lower) {
        return pos;
    }
    let noun_slot = previous.is_some_and(Context::expects_noun);
    if !noun_slot && (is_known_verb(lower) || previous.is_some_and(Context::expects_verb)) {
        return PartOfSpeech::Verb;
    }
    // Sentence starts, slots after conjunctions and punctuation, and slots
    // after determiners or verbs all default to a noun reading.
    PartOfSpeech::Noun
}

fn suffix_class(lower: &str) -> Option<PartOfSpeech> {
    let has_suffix = |suffixes: &[&str]| {
        suffixes
            .iter()
            .any(|suffix| lower.len() > suffix.len() + 2 && lower.ends_with(suffix))
    };
    if lower.len() > 4 && lower.ends_with("ly") {
        Some(PartOfSpeech::Adv)
    } else if lower.len() > 5 && (lower.ends_with("ing") || lower.ends_with("ed")) {
        Some(PartOfSpeech::Verb)
    } else if has_suffix(&["ous", "ful", "ive", "able", "ible", "less", "ical"]) {
        Some(PartOfSpeech::Adj)
    } else if has_suffix(&["tion", "sion", "ment", "ness", "ity", "ism", "ship", "ance", "ence"]) {
        Some(PartOfSpeech::Noun)
    } else {
        None
    }
}

fn is_known_verb(lower: &str) -> bool {
    if VERBS.contains(&lower) {
        return true;
    }
    if let Some(stem) = lower.strip_suffix("ies") {
        if VERBS.contains(&format!("{stem}y").as_str()) {
            return true;
        }
    }
    if let Some(stem) = lower.strip_suffix("es") {
        if VERBS.contains(&stem) {
            return true;
        }
    }
    lower
        .strip_suffix('s')
        .is_some_and(|stem| VERBS.contains(&stem))
}

fn is_numeric(segment: &str) -> bool {
    segment.chars().any(|ch| ch.is_ascii_digit())
        && segment
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == ',' || ch == '.')
}

fn ends_sentence(segment: &str) -> bool {
    matches!(segment, "." | "!" | "?")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|token| token.text.as_str()).collect()
    }

    #[test]
    fn splits_words_and_keeps_trailing_whitespace() {
        let tokens = RuleTagger.tag("The quick brown fox jumps").unwrap();
        assert_eq!(texts(&tokens), ["The", "quick", "brown", "fox", "jumps"]);
        assert_eq!(tokens[0].whitespace, " ");
        assert_eq!(tokens[4].whitespace, "");
        assert!(tokens[0].is_stop);
        assert!(!tokens[1].is_stop);
    }

    #[test]
    fn punctuation_is_its_own_token() {
        let tokens = RuleTagger.tag("Hello, world.").unwrap();
        assert_eq!(texts(&tokens), ["Hello", ",", "world", "."]);
        assert_eq!(tokens[1].pos, PartOfSpeech::Punct);
        assert_eq!(tokens[1].whitespace, " ");
        assert_eq!(tokens[0].whitespace, "");
    }

    #[test]
    fn concatenation_reproduces_input() {
        let input = "  Two  spaces,\nthen a newline.\r\nDone!  ";
        let tokens = RuleTagger.tag(input).unwrap();
        let rebuilt: String = tokens
            .iter()
            .map(|token| format!("{}{}", token.text, token.whitespace))
            .collect();
        assert_eq!(rebuilt, input);
        assert_eq!(tokens[0].pos, PartOfSpeech::Space);
    }

    #[test]
    fn capitalized_words_mid_sentence_are_names() {
        let tokens = RuleTagger.tag("We visited Paris. Museums opened").unwrap();
        let paris = tokens.iter().find(|t| t.text == "Paris").unwrap();
        assert_eq!(paris.pos, PartOfSpeech::Propn);
        assert_eq!(paris.entity.as_deref(), Some("NAME"));
        let museums = tokens.iter().find(|t| t.text == "Museums").unwrap();
        assert_eq!(museums.pos, PartOfSpeech::Noun);
        assert!(museums.entity.is_none());
    }

    #[test]
    fn dates_and_numbers_carry_entities() {
        let tokens = RuleTagger.tag("Friday brought 1,200 visitors").unwrap();
        assert_eq!(tokens[0].entity.as_deref(), Some("DATE"));
        let number = tokens.iter().find(|t| t.pos == PartOfSpeech::Num).unwrap();
        assert_eq!(number.text, "1,200");
        assert_eq!(number.entity.as_deref(), Some("CARDINAL"));
    }

    #[test]
    fn suffixes_drive_open_class_tags() {
        let tokens = RuleTagger.tag("walking quickly toward dangerous places").unwrap();
        assert_eq!(tokens[0].pos, PartOfSpeech::Verb);
        assert_eq!(tokens[1].pos, PartOfSpeech::Adv);
        assert_eq!(tokens[2].pos, PartOfSpeech::Adp);
        assert_eq!(tokens[3].pos, PartOfSpeech::Adj);
        assert_eq!(tokens[4].pos, PartOfSpeech::Noun);
    }

    #[test]
    fn verbs_and_adverbs_are_not_nouns() {
        let tokens = RuleTagger.tag("Rivers carry water and dogs run fast").unwrap();
        let tags: Vec<_> = tokens.iter().map(|t| (t.text.as_str(), t.pos)).collect();
        assert_eq!(
            tags,
            [
                ("Rivers", PartOfSpeech::Noun),
                ("carry", PartOfSpeech::Verb),
                ("water", PartOfSpeech::Noun),
                ("and", PartOfSpeech::Cconj),
                ("dogs", PartOfSpeech::Noun),
                ("run", PartOfSpeech::Verb),
                ("fast", PartOfSpeech::Adv),
            ]
        );
    }

    #[test]
    fn inflected_verbs_and_adjectives_are_recognized() {
        let tokens = RuleTagger.tag("The quick brown fox jumps").unwrap();
        assert_eq!(tokens[1].pos, PartOfSpeech::Adj);
        assert_eq!(tokens[2].pos, PartOfSpeech::Adj);
        assert_eq!(tokens[3].pos, PartOfSpeech::Noun);
        assert_eq!(tokens[4].pos, PartOfSpeech::Verb);
    }

    #[test]
    fn left_context_breaks_ties() {
        let tokens = RuleTagger.tag("they swim while their swim lasts").unwrap();
        assert_eq!(tokens[1].pos, PartOfSpeech::Verb);
        assert_eq!(tokens[4].pos, PartOfSpeech::Noun);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(RuleTagger.tag("").unwrap().is_empty());
    }
}
