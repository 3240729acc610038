//! Related-term parsing and rank-based relevance.
//!
//! Autocomplete endpoints answer with nested arrays whose leaves are either
//! plain strings or one-element arrays wrapping a string, e.g.
//!
//! ```text
//! { "items": [ [ ["rust web"], ["rust book"] ], [ "rust lang" ] ] }
//! ```
//!
//! [`parse_autocomplete`] walks any such shape and collects the strings in
//! document order. [`rank_related_terms`] then dedupes, filters and assigns
//! relevance by position only: `relevance(i) = (n - i) / n`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on related terms kept per keyword.
pub const MAX_RELATED_TERMS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTerm {
    pub term: String,
    pub relevance: f64,
}

/// Collect suggestion strings from an autocomplete payload.
///
/// Looks under `items` when the payload is an object, otherwise treats the
/// payload itself as the list. Non-string leaves are skipped.
pub fn parse_autocomplete(payload: &Value) -> Vec<String> {
    let root = match payload {
        Value::Object(map) => match map.get("items") {
            Some(items) => items,
            None => return Vec::new(),
        },
        other => other,
    };
    let mut out = Vec::new();
    match root {
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, &mut out)),
        other => collect_strings(other, &mut out),
    }
    out
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
        // A suggestion wrapped as ["term", ...extra]: only the first element is the term.
        Value::Array(items) if items.first().is_some_and(Value::is_string) => {
            collect_strings(&items[0], out);
        }
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// Relevance of rank `index` among `total` terms. Rank 0 is `1.0`.
pub fn relevance_for_rank(index: usize, total: usize) -> f64 {
    if total == 0 || index >= total {
        return 0.0;
    }
    (total - index) as f64 / total as f64
}

/// Dedupe candidates, drop the root keyword and one-character terms, keep
/// the first `max` and score them by rank.
pub fn rank_related_terms(root: &str, candidates: &[String], max: usize) -> Vec<RankedTerm> {
    if max == 0 {
        return Vec::new();
    }
    let root_norm = root.trim().to_lowercase();
    let mut seen = HashSet::new();
    let mut kept: Vec<String> = Vec::new();

    for candidate in candidates {
        let term = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
        if term.chars().count() < 2 {
            continue;
        }
        let key = term.to_lowercase();
        if key == root_norm || !seen.insert(key) {
            continue;
        }
        kept.push(term);
        if kept.len() == max {
            break;
        }
    }

    let total = kept.len();
    kept.into_iter()
        .enumerate()
        .map(|(i, term)| RankedTerm {
            term,
            relevance: relevance_for_rank(i, total),
        })
        .collect()
}
