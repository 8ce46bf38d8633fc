//! Configuration for mapping engines

use serde::{Deserialize, Serialize};

/// Configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// How source and destination property names are compared
    pub matching_strategy: MatchingStrategy,
    /// Maximum number of properties in an implicitly matched path
    pub max_depth: usize,
    /// Leave destination properties untouched when the source value is null
    pub skip_null_values: bool,
    /// Discover mappings by name when a type map is first built
    pub implicit_matching: bool,
    /// Run `validate()` before the first `map()` of every type map
    pub validate_on_first_map: bool,
    /// Break ties between equally long source paths by unmatched tokens
    #[serde(default)]
    pub rank_by_closeness: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            matching_strategy: MatchingStrategy::Standard,
            max_depth: 5,
            skip_null_values: false,
            implicit_matching: true,
            validate_on_first_map: false,
            rank_by_closeness: false,
        }
    }
}

impl MapperConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a strict config (strict name matching, validation before first map)
    pub fn strict() -> Self {
        Self {
            matching_strategy: MatchingStrategy::Strict,
            validate_on_first_map: true,
            ..Self::default()
        }
    }

    /// Set the matching strategy
    pub fn with_matching_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.matching_strategy = strategy;
        self
    }

    /// Set the maximum implicit path depth (at least 1)
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Enable/disable skipping of null source values
    pub fn with_skip_null_values(mut self, enabled: bool) -> Self {
        self.skip_null_values = enabled;
        self
    }

    /// Enable/disable implicit matching
    pub fn with_implicit_matching(mut self, enabled: bool) -> Self {
        self.implicit_matching = enabled;
        self
    }

    /// Enable/disable validation before the first map
    pub fn with_validate_on_first_map(mut self, enabled: bool) -> Self {
        self.validate_on_first_map = enabled;
        self
    }

    /// Enable/disable ranking of equally long candidates by closeness
    pub fn with_rank_by_closeness(mut self, enabled: bool) -> Self {
        self.rank_by_closeness = enabled;
        self
    }
}

/// Strategy used to decide whether a source path matches a destination path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
    /// Every destination token matched, every source property hit at least once
    #[default]
    Standard,
    /// Only the last destination property has to be fully matched
    Loose,
    /// Property by property, token by token
    Strict,
}

impl std::fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchingStrategy::Standard => write!(f, "standard"),
            MatchingStrategy::Loose => write!(f, "loose"),
            MatchingStrategy::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for MatchingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(MatchingStrategy::Standard),
            "loose" => Ok(MatchingStrategy::Loose),
            "strict" => Ok(MatchingStrategy::Strict),
            _ => Err(format!("Unknown matching strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert_eq!(config.matching_strategy, MatchingStrategy::Standard);
        assert_eq!(config.max_depth, 5);
        assert!(config.implicit_matching);
        assert!(!config.skip_null_values);
        assert!(!config.validate_on_first_map);
        assert!(!config.rank_by_closeness);
        assert_eq!(MatchingStrategy::default(), MatchingStrategy::Standard);
    }

    #[test]
    fn test_strict_config() {
        let config = MapperConfig::strict();
        assert_eq!(config.matching_strategy, MatchingStrategy::Strict);
        assert!(config.validate_on_first_map);
    }

    #[test]
    fn test_builder() {
        let config = MapperConfig::new()
            .with_matching_strategy(MatchingStrategy::Loose)
            .with_max_depth(0)
            .with_skip_null_values(true);

        assert_eq!(config.matching_strategy, MatchingStrategy::Loose);
        assert_eq!(config.max_depth, 1);
        assert!(config.skip_null_values);
    }

    #[test]
    fn test_matching_strategy_parse() {
        assert_eq!(
            "standard".parse::<MatchingStrategy>().unwrap(),
            MatchingStrategy::Standard
        );
        assert_eq!(
            "STRICT".parse::<MatchingStrategy>().unwrap(),
            MatchingStrategy::Strict
        );
        assert!("fuzzy".parse::<MatchingStrategy>().is_err());
    }

    #[test]
    fn test_config_serde() {
        let config = MapperConfig::strict().with_max_depth(3);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["matching_strategy"], "strict");

        let parsed: MapperConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_closeness_ranking_defaults_off_when_absent() {
        let parsed: MapperConfig = serde_json::from_value(serde_json::json!({
            "matching_strategy": "loose",
            "max_depth": 4,
            "skip_null_values": false,
            "implicit_matching": true,
            "validate_on_first_map": false
        }))
        .unwrap();
        assert!(!parsed.rank_by_closeness);
        assert!(MapperConfig::new().with_rank_by_closeness(true).rank_by_closeness);
    }
}
