//! # Game List Search
//!
//! Fuzzy subsequence matching used to filter game lists as the user types.
//!
//! - [`fuzzy_match`](fuzzy::fuzzy_match) scores one candidate against a pattern
//! - [`filter_candidates`](filter::filter_candidates) keeps and orders the
//!   candidates worth showing
//!
//! Both are pure functions: no shared state, safe to call from any task.
//!
//! ```rust
//! use core_search::{filter_candidates, fuzzy_match, DEFAULT_SEARCH_SCORE};
//!
//! let result = fuzzy_match("hk", "Hollow Knight");
//! assert!(result.matched);
//!
//! let games = ["Hades", "Hollow Knight", "Celeste"];
//! let hits = filter_candidates("hk", &games, DEFAULT_SEARCH_SCORE);
//! assert_eq!(hits[0].candidate, "Hollow Knight");
//! ```

pub mod filter;
pub mod fuzzy;

pub use filter::{filter_candidates, rank, ScoredCandidate, DEFAULT_SEARCH_SCORE};
pub use fuzzy::{fuzzy_match, FuzzyMatchResult};
