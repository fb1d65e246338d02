//! Lightweight named-entity tagging: proposes capitalized phrases from
//! free text as place-name candidates. Candidates are only suggestions;
//! the extractor validates every one against the gazetteer, so false
//! positives here cost a hash lookup, not a wrong answer.

use std::collections::HashSet;

/// Words that start sentences or glue phrases together and are never
/// place names on their own.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "of", "for", "and", "but", "or", "with", "from", "by",
    "to", "near", "after", "before", "during", "breaking", "update", "today", "now",
];

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Candidate place phrases, lowercased, in text order: each run of up to
/// four consecutive capitalized words yields the full phrase followed by
/// its individual words. Duplicates and bare stopwords are dropped.
pub fn place_candidates(text: &str) -> Vec<String> {
    fn push(candidate: String, out: &mut Vec<String>, seen: &mut HashSet<String>) {
        if !STOPWORDS.contains(&candidate.as_str()) && seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }

    fn flush(phrase: &mut Vec<&str>, out: &mut Vec<String>, seen: &mut HashSet<String>) {
        if phrase.len() > 1 {
            push(phrase.join(" ").to_lowercase(), out, seen);
        }
        for word in phrase.drain(..) {
            push(word.to_lowercase(), out, seen);
        }
    }

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    let mut phrase: Vec<&str> = Vec::new();

    for raw in text.split_whitespace() {
        let word = strip_punct(raw);
        if !word.is_empty() && is_capitalized(word) {
            if phrase.len() == 4 {
                flush(&mut phrase, &mut candidates, &mut seen);
            }
            let ends_clause = raw.ends_with([',', '.', ';', ':', '!', '?']);
            phrase.push(word);
            if ends_clause {
                flush(&mut phrase, &mut candidates, &mut seen);
            }
        } else {
            flush(&mut phrase, &mut candidates, &mut seen);
        }
    }
    flush(&mut phrase, &mut candidates, &mut seen);

    candidates
}
