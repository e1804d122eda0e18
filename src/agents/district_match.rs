//! District name resolution from free text.
//!
//! Exact case-insensitive substring match always wins. Only when no district
//! name appears verbatim is fuzzy matching tried: first each query word of at
//! least five characters against every district (cutoff 0.75), then, for a
//! single-word query, the whole query (looser cutoff 0.7).

use serde::Serialize;

use crate::config::validation::levenshtein;

/// Minimum word length considered for fuzzy matching
pub const MIN_FUZZY_WORD_LEN: usize = 5;
/// Cutoff for individual words of a multi-word query
pub const WORD_CUTOFF: f64 = 0.75;
/// Cutoff for a single-word query
pub const SINGLE_WORD_CUTOFF: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictMatch {
    pub district: String,
    pub method: MatchMethod,
}

/// Normalized edit similarity in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Every district whose name appears verbatim (case-insensitive), in list order.
pub fn exact_matches(query: &str, districts: &[String]) -> Vec<String> {
    let query = query.to_lowercase();
    districts
        .iter()
        .filter(|d| !d.is_empty() && query.contains(&d.to_lowercase()))
        .cloned()
        .collect()
}

fn closest<'a>(word: &str, districts: &'a [String], cutoff: f64) -> Option<&'a String> {
    let mut best: Option<(&String, f64)> = None;
    for d in districts {
        let s = similarity(word, &d.to_lowercase());
        if s >= cutoff && best.map_or(true, |(_, b)| s > b) {
            best = Some((d, s));
        }
    }
    best.map(|(d, _)| d)
}

/// Fuzzy-only lookup.
pub fn fuzzy_match(query: &str, districts: &[String]) -> Option<String> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();

    for word in words.iter().filter(|w| w.chars().count() >= MIN_FUZZY_WORD_LEN) {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if let Some(d) = closest(word, districts, WORD_CUTOFF) {
            return Some(d.clone());
        }
    }

    if words.len() == 1 && query.trim().chars().count() >= MIN_FUZZY_WORD_LEN {
        return closest(query.trim(), districts, SINGLE_WORD_CUTOFF).cloned();
    }
    None
}

/// Resolve one target district: first exact match, else fuzzy.
pub fn resolve(query: &str, districts: &[String]) -> Option<DistrictMatch> {
    if let Some(d) = exact_matches(query, districts).into_iter().next() {
        return Some(DistrictMatch {
            district: d,
            method: MatchMethod::Exact,
        });
    }
    fuzzy_match(query, districts).map(|district| DistrictMatch {
        district,
        method: MatchMethod::Fuzzy,
    })
}

/// Canonical spelling of a caller-supplied district name: case-insensitive
/// equality first, then the same resolution as free text.
pub fn canonical(name: &str, districts: &[String]) -> Option<DistrictMatch> {
    let name = name.trim();
    if let Some(d) = districts.iter().find(|d| d.eq_ignore_ascii_case(name)) {
        return Some(DistrictMatch {
            district: d.clone(),
            method: MatchMethod::Exact,
        });
    }
    resolve(name, districts)
}

/// All districts a query mentions. Exact matches if any, else at most one fuzzy match.
pub fn mentioned_districts(query: &str, districts: &[String]) -> Vec<String> {
    let exact = exact_matches(query, districts);
    if !exact.is_empty() {
        return exact;
    }
    fuzzy_match(query, districts).into_iter().collect()
}
