//! Token comparison for each matching strategy

use std::collections::HashSet;

use crate::config::MatchingStrategy;

/// Tokens of every property name along a path, root first
pub type PathTokens = [Vec<String>];

impl MatchingStrategy {
    /// Whether the source path is a match for the destination path
    pub fn matches(&self, destination: &PathTokens, source: &PathTokens) -> bool {
        if destination.is_empty() || source.is_empty() {
            return false;
        }
        match self {
            MatchingStrategy::Standard => standard(destination, source),
            MatchingStrategy::Loose => loose(destination, source),
            MatchingStrategy::Strict => strict(destination, source),
        }
    }
}

fn token_set(tokens: &PathTokens) -> HashSet<&str> {
    tokens.iter().flatten().map(String::as_str).collect()
}

fn standard(destination: &PathTokens, source: &PathTokens) -> bool {
    let source_tokens = token_set(source);
    let destination_tokens = token_set(destination);

    destination_tokens.iter().all(|t| source_tokens.contains(t))
        && source
            .iter()
            .all(|property| property.iter().any(|t| destination_tokens.contains(t.as_str())))
}

fn loose(destination: &PathTokens, source: &PathTokens) -> bool {
    let source_tokens = token_set(source);
    let destination_tokens = token_set(destination);
    let (Some(last_destination), Some(last_source)) = (destination.last(), source.last()) else {
        return false;
    };

    !last_destination.is_empty()
        && last_destination
            .iter()
            .all(|t| source_tokens.contains(t.as_str()))
        && last_source
            .iter()
            .any(|t| destination_tokens.contains(t.as_str()))
}

fn strict(destination: &PathTokens, source: &PathTokens) -> bool {
    destination.len() == source.len() && destination.iter().zip(source).all(|(d, s)| d == s)
}

/// Source tokens with no counterpart in the destination; lower is closer
pub fn unmatched_source_tokens(destination: &PathTokens, source: &PathTokens) -> usize {
    let destination_tokens = token_set(destination);
    source
        .iter()
        .flatten()
        .filter(|t| !destination_tokens.contains(t.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(properties: &[&[&str]]) -> Vec<Vec<String>> {
        properties
            .iter()
            .map(|p| p.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_standard() {
        let strategy = MatchingStrategy::Standard;
        let destination = path(&[&["full", "address"], &["city"]]);

        assert!(strategy.matches(&destination, &path(&[&["full", "address"], &["city", "name"]])));
        assert!(strategy.matches(&destination, &path(&[&["full", "address", "city"]])));
        // `customer` contributes no destination token
        assert!(!strategy.matches(
            &path(&[&["name"]]),
            &path(&[&["customer"], &["name"]])
        ));
        // `full` is never matched
        assert!(!strategy.matches(&destination, &path(&[&["address"], &["city"]])));
    }

    #[test]
    fn test_loose() {
        let strategy = MatchingStrategy::Loose;
        assert!(strategy.matches(
            &path(&[&["shipping"], &["city"]]),
            &path(&[&["address"], &["city"]])
        ));
        assert!(!strategy.matches(
            &path(&[&["shipping"], &["city"]]),
            &path(&[&["address"], &["zip"]])
        ));
    }

    #[test]
    fn test_strict() {
        let strategy = MatchingStrategy::Strict;
        assert!(strategy.matches(&path(&[&["first", "name"]]), &path(&[&["first", "name"]])));
        assert!(!strategy.matches(&path(&[&["first", "name"]]), &path(&[&["name", "first"]])));
        assert!(!strategy.matches(
            &path(&[&["address"], &["city"]]),
            &path(&[&["address", "city"]])
        ));
    }

    #[test]
    fn test_empty_never_matches() {
        assert!(!MatchingStrategy::Standard.matches(&[], &path(&[&["a"]])));
        assert!(!MatchingStrategy::Standard.matches(&path(&[&["a"]]), &[]));
    }

    #[test]
    fn test_unmatched_source_tokens() {
        let destination = path(&[&["city"]]);
        assert_eq!(unmatched_source_tokens(&destination, &path(&[&["city"]])), 0);
        assert_eq!(
            unmatched_source_tokens(&destination, &path(&[&["home", "city"]])),
            1
        );
    }
}
