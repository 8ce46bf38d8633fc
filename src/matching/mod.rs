//! Implicit matching between source and destination property trees
//!
//! Matching is a pure function of the two type shapes, the tokenizer and the
//! [`MatchingStrategy`](crate::MatchingStrategy): it performs no I/O and
//! yields the same result for the same inputs.

mod matcher;
mod strategy;

pub use matcher::{AmbiguousMatch, ImplicitMatch, ImplicitMatcher};
pub use strategy::{PathTokens, unmatched_source_tokens};
