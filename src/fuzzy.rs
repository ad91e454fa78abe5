//! Token-set fuzzy matching against closed vocabularies.
//!
//! Both sides are lower-cased and reduced to alphanumeric tokens. A
//! candidate's score is the better of the token-set ratio (order and
//! duplicate insensitive) and the plain ratio of the processed strings, on a
//! 0..=100 scale. Ties keep the candidate with the higher plain ratio, then
//! the earlier one, so results are stable for a fixed candidate list.

use crate::error::{ScrapeError, ScrapeResult};
use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

pub const DEFAULT_MIN_SCORE: u8 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub matched: String,
    pub score: u8,
}

pub fn process(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn scaled(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

fn processed_ratio(a: &str, b: &str) -> u8 {
    scaled(normalized_levenshtein(a, b))
}

pub fn ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (process(a), process(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    processed_ratio(&a, &b)
}

pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (process(a), process(b));
    let left: BTreeSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let right: BTreeSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let common = join(left.intersection(&right).copied().collect());
    let only_left = join(left.difference(&right).copied().collect());
    let only_right = join(right.difference(&left).copied().collect());

    let with_left = format!("{common} {only_left}").trim().to_string();
    let with_right = format!("{common} {only_right}").trim().to_string();

    let mut best = processed_ratio(&with_left, &with_right);
    if !common.is_empty() {
        best = best
            .max(processed_ratio(&common, &with_left))
            .max(processed_ratio(&common, &with_right));
    }
    best
}

pub fn score(query: &str, candidate: &str) -> u8 {
    token_set_ratio(query, candidate).max(ratio(query, candidate))
}

/// Best candidate for `query`, or `None` when `candidates` is empty.
pub fn extract_one<S: AsRef<str>>(query: &str, candidates: &[S]) -> Option<Resolution> {
    let mut best: Option<(u8, u8, &str)> = None;

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let key = (score(query, candidate), ratio(query, candidate));
        let better = match best {
            Some((s, r, _)) => key > (s, r),
            None => true,
        };
        if better {
            best = Some((key.0, key.1, candidate));
        }
    }

    best.map(|(score, _, matched)| Resolution {
        matched: matched.to_string(),
        score,
    })
}

/// Like [`extract_one`], but a best match under `min_score` is an error.
pub fn resolve<S: AsRef<str>>(
    kind: &'static str,
    query: &str,
    candidates: &[S],
    min_score: u8,
) -> ScrapeResult<Resolution> {
    let resolution = extract_one(query, candidates)
        .ok_or_else(|| ScrapeError::validation(format!("no {kind} candidates to match {query:?}")))?;

    if resolution.score < min_score {
        return Err(ScrapeError::Resolution {
            kind,
            query: query.to_string(),
            best: resolution.matched,
            score: resolution.score,
            min_score,
        });
    }
    Ok(resolution)
}
