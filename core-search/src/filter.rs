//! Candidate filtering built on [`fuzzy_match`].

use serde::Serialize;
use tracing::trace;

use crate::fuzzy::{fuzzy_match, FuzzyMatchResult};

/// Score above which a candidate is kept even though the pattern did not
/// match it.
pub const DEFAULT_SEARCH_SCORE: i32 = 150;

/// A candidate together with its match result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate<T> {
    pub candidate: T,
    pub result: FuzzyMatchResult,
}

/// Score every candidate, best first.
///
/// Pattern and candidate are both lowercased before scoring, so list search
/// never earns the camel-case bonus. Ordering is by descending score;
/// candidates with equal scores keep their input order.
pub fn rank<T>(pattern: &str, candidates: &[T]) -> Vec<ScoredCandidate<T>>
where
    T: AsRef<str> + Clone,
{
    let pattern = lowercase(pattern);
    let mut scored: Vec<ScoredCandidate<T>> = candidates
        .iter()
        .map(|candidate| ScoredCandidate {
            result: fuzzy_match(&pattern, &lowercase(candidate.as_ref())),
            candidate: candidate.clone(),
        })
        .collect();

    // Stable sort keeps input order for ties.
    scored.sort_by(|a, b| b.result.score.cmp(&a.result.score));
    scored
}

/// Keep the candidates worth showing for `pattern`.
///
/// A candidate survives when it matched or scored above `threshold`. A blank
/// pattern keeps every candidate in input order.
pub fn filter_candidates<T>(pattern: &str, candidates: &[T], threshold: i32) -> Vec<ScoredCandidate<T>>
where
    T: AsRef<str> + Clone,
{
    if pattern.trim().is_empty() {
        return candidates
            .iter()
            .map(|candidate| ScoredCandidate {
                result: fuzzy_match("", candidate.as_ref()),
                candidate: candidate.clone(),
            })
            .collect();
    }

    let kept: Vec<ScoredCandidate<T>> = rank(pattern, candidates)
        .into_iter()
        .filter(|scored| scored.result.matched || scored.result.score > threshold)
        .collect();

    trace!(
        pattern,
        total = candidates.len(),
        kept = kept.len(),
        "Filtered candidates"
    );

    kept
}

/// Lowercase one char at a time so match positions still index the
/// original text. Chars whose lowercase form is longer are kept as they are.
fn lowercase(text: &str) -> String {
    text.chars()
        .map(|c| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        })
        .collect()
}
