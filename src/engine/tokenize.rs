//! Term extraction shared by indexing and querying.

use regex::Regex;
use std::collections::HashMap;

/// Minimum term length; shorter tokens carry almost no signal
const MIN_TERM_LEN: usize = 3;

fn term_pattern() -> Regex {
    // Compiled per call; term extraction runs once per document or query
    Regex::new(r"[a-z0-9]+").expect("static term pattern")
}

/// Extract term frequencies from document text
pub fn document_terms(text: &str) -> HashMap<String, u32> {
    let pattern = term_pattern();
    let lowered = text.to_lowercase();
    let mut terms: HashMap<String, u32> = HashMap::new();
    for m in pattern.find_iter(&lowered) {
        let term = m.as_str();
        if term.len() >= MIN_TERM_LEN {
            *terms.entry(term.to_string()).or_insert(0) += 1;
        }
    }
    terms
}

/// Extract query terms in order, duplicates removed
pub fn query_terms(text: &str) -> Vec<String> {
    let pattern = term_pattern();
    let lowered = text.to_lowercase();
    let mut seen = Vec::new();
    for m in pattern.find_iter(&lowered) {
        let term = m.as_str();
        if term.len() >= MIN_TERM_LEN && !seen.iter().any(|s| s == term) {
            seen.push(term.to_string());
        }
    }
    seen
}
