//! Error types for mapping operations

use std::fmt;

use thiserror::Error;

use crate::descriptor::TypeName;

/// Boxed cause carried by [`MapperError::Mapping`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A top-level destination property that has no mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedProperty {
    /// Type map the property belongs to, e.g. `TypeMap[Order -> OrderDto]`
    pub type_map: String,
    /// Destination property name
    pub property: String,
}

impl fmt::Display for UnmappedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_map, self.property)
    }
}

/// Errors that can occur while configuring or executing mappings
#[derive(Error, Debug)]
pub enum MapperError {
    /// A required argument was null
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Explicit mappings could not be resolved against the type descriptors
    #[error("Configuration error in {type_map}: {}", messages.join("; "))]
    Configuration {
        type_map: String,
        messages: Vec<String>,
    },

    /// Destination properties left without a mapping
    #[error("Unmapped destination properties: {}", join_unmapped(unmapped))]
    Validation { unmapped: Vec<UnmappedProperty> },

    /// Failure while resolving, converting or assigning a property
    #[error("Failed to map {source_path} to {destination_path}: {cause}")]
    Mapping {
        source_path: String,
        destination_path: String,
        #[source]
        cause: BoxError,
    },

    /// No descriptor is available for the type
    #[error("Unknown type: {0}")]
    UnknownType(TypeName),

    /// Typed values could not cross the JSON boundary
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for mapping operations
pub type MapperResult<T> = Result<T, MapperError>;

impl MapperError {
    pub(crate) fn mapping(
        source_path: impl fmt::Display,
        destination_path: impl fmt::Display,
        cause: impl Into<BoxError>,
    ) -> Self {
        MapperError::Mapping {
            source_path: source_path.to_string(),
            destination_path: destination_path.to_string(),
            cause: cause.into(),
        }
    }

    pub(crate) fn configuration(type_map: impl fmt::Display, messages: Vec<String>) -> Self {
        MapperError::Configuration {
            type_map: type_map.to_string(),
            messages,
        }
    }

    /// Properties reported by a validation error, empty for every other kind
    pub fn unmapped_properties(&self) -> &[UnmappedProperty] {
        match self {
            MapperError::Validation { unmapped } => unmapped,
            _ => &[],
        }
    }

    /// Destination path of the mapping that failed, if this is a mapping error
    pub fn destination_path(&self) -> Option<&str> {
        match self {
            MapperError::Mapping {
                destination_path, ..
            } => Some(destination_path),
            _ => None,
        }
    }
}

fn join_unmapped(unmapped: &[UnmappedProperty]) -> String {
    unmapped
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MapperError::InvalidArgument("source is null".to_string());
        assert!(err.to_string().contains("source is null"));

        let err = MapperError::configuration(
            "TypeMap[A -> B]",
            vec!["first".to_string(), "second".to_string()],
        );
        let message = err.to_string();
        assert!(message.contains("TypeMap[A -> B]"));
        assert!(message.contains("first; second"));
    }

    #[test]
    fn test_validation_lists_every_property() {
        let err = MapperError::Validation {
            unmapped: vec![
                UnmappedProperty {
                    type_map: "TypeMap[A -> B]".to_string(),
                    property: "age".to_string(),
                },
                UnmappedProperty {
                    type_map: "TypeMap[A -> B]".to_string(),
                    property: "email".to_string(),
                },
            ],
        };

        assert_eq!(err.unmapped_properties().len(), 2);
        assert!(err.to_string().contains("age"));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_mapping_error_keeps_cause() {
        let err = MapperError::mapping("name", "fullName", anyhow::anyhow!("boom"));
        assert_eq!(err.destination_path(), Some("fullName"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("boom"));
    }
}
