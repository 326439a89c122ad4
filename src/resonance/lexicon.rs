//! Lexical matching between a persuasion message and a belief's declared
//! core values and promises.
//!
//! Matching is on normalised word sets (lowercase, trailing plural `s`
//! dropped, stopwords removed) so the result depends only on the text.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

/// Words too common to carry meaning
pub static STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "our", "you", "your", "will", "that", "this", "are", "all",
    "who", "from", "into", "than", "them", "they", "their", "was", "were", "have", "has", "not",
    "but", "can", "join",
];

/// Words that pitch change, which risk-averse NPCs distrust
pub static CHANGE_WORDS: &[&str] = &[
    "change",
    "new",
    "revolution",
    "reform",
    "transform",
    "disrupt",
    "overthrow",
    "future",
    "break",
    "radical",
    "progress",
    "upheaval",
];

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("static regex");
    static ref STOP: BTreeSet<String> = STOPWORDS.iter().map(|w| normalize(w)).collect();
    static ref CHANGE: BTreeSet<String> = CHANGE_WORDS.iter().map(|w| normalize(w)).collect();
}

fn normalize(word: &str) -> String {
    let lower = word.to_lowercase();
    match lower.strip_suffix('s') {
        Some(stem) if stem.len() >= 3 && !stem.ends_with('s') => stem.to_string(),
        _ => lower,
    }
}

/// Significant normalised words of a text
pub fn tokens(text: &str) -> BTreeSet<String> {
    WORD.find_iter(text)
        .map(|m| normalize(m.as_str()))
        .filter(|w| w.chars().count() >= 3 && !STOP.contains(w))
        .collect()
}

/// Whether a tokenised message pitches change
pub fn signals_change(message: &BTreeSet<String>) -> bool {
    message.iter().any(|w| CHANGE.contains(w))
}

/// Mean fraction of each phrase's words present in the message, in [0,1].
///
/// Phrases with no significant words are ignored; `None` when nothing is
/// left to match.
pub fn phrase_coverage(message: &BTreeSet<String>, phrases: &[String]) -> Option<f64> {
    let fractions: Vec<f64> = phrases
        .iter()
        .map(|p| tokens(p))
        .filter(|words| !words.is_empty())
        .map(|words| {
            let hits = words.iter().filter(|w| message.contains(*w)).count();
            hits as f64 / words.len() as f64
        })
        .collect();

    if fractions.is_empty() {
        None
    } else {
        Some(fractions.iter().sum::<f64>() / fractions.len() as f64)
    }
}

/// Content match in [0,100].
///
/// Core values weigh `core_weight`, promises the rest. When a belief
/// declares only one of the two lists it takes the whole weight; a belief
/// with neither never matches.
pub fn content_match(
    message: &BTreeSet<String>,
    core_values: &[String],
    promises: &[String],
    core_weight: f64,
) -> f64 {
    let core = phrase_coverage(message, core_values);
    let promise = phrase_coverage(message, promises);

    let fraction = match (core, promise) {
        (Some(c), Some(p)) => core_weight * c + (1.0 - core_weight) * p,
        (Some(c), None) => c,
        (None, Some(p)) => p,
        (None, None) => 0.0,
    };

    (fraction * 100.0).clamp(0.0, 100.0)
}
