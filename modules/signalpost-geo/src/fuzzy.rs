//! Token-order-independent fuzzy string matching against the gazetteer.
//! The linear scan over every key makes this the most expensive local
//! strategy; both cascades run it after all hash lookups have failed.

use strsim::normalized_levenshtein;

use crate::gazetteer::{Gazetteer, GazetteerEntry};

/// Inputs shorter than this carry too little signal to score reliably.
const MIN_TEXT_LEN: usize = 5;

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ").to_lowercase()
}

/// Similarity on a 0-100 scale, insensitive to token order: both sides are
/// lowercased, tokenized, sorted, and rejoined before Levenshtein scoring.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (token_sort(a), token_sort(b));
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    (normalized_levenshtein(&a, &b) * 100.0).round() as u8
}

/// Best-scoring gazetteer entry for `text`, accepted only at or above
/// `threshold`. Returns the entry and its score.
pub fn best_match<'a>(
    text: &str,
    gazetteer: &'a Gazetteer,
    threshold: u8,
) -> Option<(&'a GazetteerEntry, u8)> {
    if text.trim().chars().count() < MIN_TEXT_LEN {
        return None;
    }

    let mut best: Option<(&GazetteerEntry, u8)> = None;
    for key in gazetteer.keys() {
        let score = token_sort_ratio(text, key);
        if best.map_or(true, |(_, s)| score > s) {
            if let Some(entry) = gazetteer.get_normalized(key) {
                best = Some((entry, score));
            }
        }
    }

    best.filter(|&(_, score)| score >= threshold)
}
