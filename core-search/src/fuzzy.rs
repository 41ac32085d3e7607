//! Fuzzy subsequence matcher.
//!
//! A pattern matches a text when every pattern character appears in the text
//! in order, compared case-insensitively. Among the possible alignments the
//! matcher keeps the best-scoring one, exploring alternatives by bounded
//! recursion: at each matched character it also tries matching the same
//! pattern character further along the text.
//!
//! # Scoring
//!
//! | Rule | Points |
//! |------|--------|
//! | Base | 100 |
//! | Each text character before the first match | -5 (at most -15 in total) |
//! | Each text character not covered by the match | -1 |
//! | Match directly after the previous match | +15 |
//! | Match after `_` or a space | +30 |
//! | Uppercase match after a lowercase character | +30 |
//! | Match at text position 0 | +15 |
//!
//! # Bounds
//!
//! Each chain of recursive calls is at most [`RECURSION_LIMIT`] deep, and an
//! alignment records at most [`MAX_MATCHES`] positions. A branch past the
//! depth limit simply does not match; a pattern longer than the position
//! budget never matches.

use serde::Serialize;

const SEQUENTIAL_BONUS: i32 = 15;
const SEPARATOR_BONUS: i32 = 30;
const CAMEL_BONUS: i32 = 30;
const FIRST_LETTER_BONUS: i32 = 15;

const LEADING_LETTER_PENALTY: i32 = -5;
const MAX_LEADING_LETTER_PENALTY: i32 = -15;
const UNMATCHED_LETTER_PENALTY: i32 = -1;

const BASE_SCORE: i32 = 100;

/// Depth of the deepest recursive call chain, counting the top-level call.
pub const RECURSION_LIMIT: u32 = 10;

/// Maximum number of match positions recorded for one alignment.
pub const MAX_MATCHES: usize = 256;

/// Outcome of [`fuzzy_match`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FuzzyMatchResult {
    /// Whether the whole pattern matched as a subsequence.
    pub matched: bool,
    /// Alignment score; `0` when not matched.
    pub score: i32,
    /// Character indices (not byte offsets) of the chosen alignment.
    pub positions: Vec<usize>,
}

impl FuzzyMatchResult {
    fn no_match() -> Self {
        Self::default()
    }
}

/// Score `text` against `pattern`.
///
/// An empty pattern matches everything with `100 - len(text)`: no bonuses,
/// no leading penalty, every character unmatched.
///
/// ```rust
/// use core_search::fuzzy_match;
///
/// let result = fuzzy_match("abc", "abc");
/// assert!(result.matched);
/// assert_eq!(result.score, 145);
/// assert_eq!(result.positions, vec![0, 1, 2]);
/// ```
pub fn fuzzy_match(pattern: &str, text: &str) -> FuzzyMatchResult {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    if pattern.is_empty() {
        return FuzzyMatchResult {
            matched: true,
            score: BASE_SCORE.saturating_add(UNMATCHED_LETTER_PENALTY.saturating_mul(to_i32(text.len()))),
            positions: Vec::new(),
        };
    }

    if pattern.len() > MAX_MATCHES {
        return FuzzyMatchResult::no_match();
    }

    let matcher = Matcher {
        pattern: &pattern,
        text: &text,
    };

    match matcher.recurse(0, 0, &[], 1) {
        Some((score, positions)) => FuzzyMatchResult {
            matched: true,
            score,
            positions,
        },
        None => FuzzyMatchResult::no_match(),
    }
}

struct Matcher<'a> {
    pattern: &'a [char],
    text: &'a [char],
}

impl<'a> Matcher<'a> {
    /// Match `pattern[p..]` against `text[t..]` given the positions already
    /// chosen in `prefix`. Returns the best score and full position list.
    fn recurse(&self, mut p: usize, mut t: usize, prefix: &[usize], depth: u32) -> Option<(i32, Vec<usize>)> {
        let (pattern, text) = (self.pattern, self.text);

        if depth >= RECURSION_LIMIT {
            return None;
        }

        if p == pattern.len() || t == text.len() {
            return None;
        }

        // Not enough text left for the rest of the pattern.
        if text.len() - t < pattern.len() - p {
            return None;
        }

        let mut matches = prefix.to_vec();
        let mut best_alternative: Option<(i32, Vec<usize>)> = None;

        while p < pattern.len() && t < text.len() {
            if eq_ignore_case(pattern[p], text[t]) {
                // Same pattern character, later in the text.
                if let Some((score, positions)) = self.recurse(p, t + 1, &matches, depth + 1) {
                    let better = best_alternative
                        .as_ref()
                        .map_or(true, |(best, _)| score > *best);
                    if better {
                        best_alternative = Some((score, positions));
                    }
                }

                matches.push(t);
                p += 1;
            }
            t += 1;
        }

        let own = (p == pattern.len()).then(|| score_alignment(text, &matches));

        match (own, best_alternative) {
            (Some(own_score), Some((alt_score, alt))) if alt_score > own_score => {
                Some((alt_score, alt))
            }
            (Some(own_score), _) => Some((own_score, matches)),
            (None, alternative) => alternative,
        }
    }
}

fn score_alignment(text: &[char], matches: &[usize]) -> i32 {
    let mut score = BASE_SCORE;

    if let Some(&first) = matches.first() {
        let leading = LEADING_LETTER_PENALTY.saturating_mul(to_i32(first));
        score += leading.max(MAX_LEADING_LETTER_PENALTY);
    }

    let unmatched = text.len().saturating_sub(matches.len());
    score = score.saturating_add(UNMATCHED_LETTER_PENALTY.saturating_mul(to_i32(unmatched)));

    for (i, &idx) in matches.iter().enumerate() {
        if i > 0 && idx == matches[i - 1] + 1 {
            score += SEQUENTIAL_BONUS;
        }

        if idx == 0 {
            score += FIRST_LETTER_BONUS;
            continue;
        }

        let neighbor = text[idx - 1];
        let current = text[idx];

        if neighbor.is_lowercase() && current.is_uppercase() {
            score += CAMEL_BONUS;
        }

        if neighbor == '_' || neighbor == ' ' {
            score += SEPARATOR_BONUS;
        }
    }

    score
}

fn eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
