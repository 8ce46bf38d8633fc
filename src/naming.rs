//! Naming conventions: splitting property names into comparable tokens

use once_cell::sync::Lazy;
use regex::Regex;

/// Splits a property name into ordered tokens
///
/// Implementations must be pure; the matcher calls them once per property
/// while a type map is built.
pub trait NameTokenizer: Send + Sync {
    fn tokenize(&self, name: &str) -> Vec<String>;
}

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-.$]+").unwrap());

/// Case and separator insensitive tokenizer
///
/// `firstName`, `first_name`, `FirstName` and `first-name` all yield
/// `["first", "name"]`; acronyms stay together (`HTTPServer` -> `http`, `server`)
/// and digits form their own token.
#[derive(Debug, Clone, Copy, Default)]
pub struct CamelCaseTokenizer;

impl NameTokenizer for CamelCaseTokenizer {
    fn tokenize(&self, name: &str) -> Vec<String> {
        SEPARATORS
            .split(name)
            .filter(|chunk| !chunk.is_empty())
            .flat_map(split_camel_case)
            .map(|token| token.to_lowercase())
            .collect()
    }
}

fn split_camel_case(chunk: &str) -> Vec<String> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_uppercase() && c.is_uppercase() && next_is_lower)
                || (prev.is_ascii_digit() != c.is_ascii_digit());
            if boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(name: &str) -> Vec<String> {
        CamelCaseTokenizer.tokenize(name)
    }

    #[test]
    fn test_case_conventions_agree() {
        let expected = vec!["first".to_string(), "name".to_string()];
        assert_eq!(tokens("firstName"), expected);
        assert_eq!(tokens("first_name"), expected);
        assert_eq!(tokens("FirstName"), expected);
        assert_eq!(tokens("first-name"), expected);
        assert_eq!(tokens("FIRST_NAME"), expected);
    }

    #[test]
    fn test_acronyms_and_digits() {
        assert_eq!(tokens("HTTPServer"), vec!["http", "server"]);
        assert_eq!(tokens("userID"), vec!["user", "id"]);
        assert_eq!(tokens("line2Address"), vec!["line", "2", "address"]);
        assert_eq!(tokens("address_1"), vec!["address", "1"]);
    }

    #[test]
    fn test_degenerate_names() {
        assert!(tokens("").is_empty());
        assert!(tokens("__").is_empty());
        assert_eq!(tokens("x"), vec!["x"]);
    }
}
