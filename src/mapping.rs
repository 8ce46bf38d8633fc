//! Resolved property correspondences

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::ValueType;
use crate::path::PropertyPath;
use crate::spi::{Condition, Converter, Provider};

/// Where a mapping takes its value from
#[derive(Debug, Clone, PartialEq)]
pub enum MappingSource {
    /// A property path on the source object; the root path is the object itself
    Property(PropertyPath),
    /// A literal value, independent of the source
    Constant(Value),
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSource::Property(path) => write!(f, "{}", path),
            MappingSource::Constant(value) => write!(f, "constant {}", value),
        }
    }
}

/// One destination path bound to a source path or literal
#[derive(Clone)]
pub struct Mapping {
    destination: PropertyPath,
    source: MappingSource,
    source_type: ValueType,
    explicit: bool,
    skipped: bool,
    pub(crate) condition: Option<Arc<dyn Condition>>,
    pub(crate) converter: Option<Arc<dyn Converter>>,
    pub(crate) provider: Option<Arc<dyn Provider>>,
}

impl Mapping {
    /// Mapping discovered by the matcher
    pub(crate) fn implicit(destination: PropertyPath, source: PropertyPath) -> Self {
        let source_type = source.leaf_type().cloned().unwrap_or(ValueType::Any);
        Self::with_source(destination, MappingSource::Property(source), source_type, false)
    }

    pub(crate) fn with_source(
        destination: PropertyPath,
        source: MappingSource,
        source_type: ValueType,
        explicit: bool,
    ) -> Self {
        Self {
            destination,
            source,
            source_type,
            explicit,
            skipped: false,
            condition: None,
            converter: None,
            provider: None,
        }
    }

    pub(crate) fn skip(mut self) -> Self {
        self.skipped = true;
        self
    }

    pub fn destination(&self) -> &PropertyPath {
        &self.destination
    }

    pub fn source(&self) -> &MappingSource {
        &self.source
    }

    /// Source path, `None` for literal mappings
    pub fn source_path(&self) -> Option<&PropertyPath> {
        match &self.source {
            MappingSource::Property(path) => Some(path),
            MappingSource::Constant(_) => None,
        }
    }

    /// Declared type of the source value
    pub fn source_type(&self) -> &ValueType {
        &self.source_type
    }

    /// Declared type of the destination property
    pub fn destination_type(&self) -> &ValueType {
        self.destination.leaf_type().unwrap_or(&ValueType::Any)
    }

    /// Declared through a `PropertyMap` rather than discovered
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Counts as mapped but is never applied
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn condition(&self) -> Option<&Arc<dyn Condition>> {
        self.condition.as_ref()
    }

    pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
        self.converter.as_ref()
    }

    pub fn provider(&self) -> Option<&Arc<dyn Provider>> {
        self.provider.as_ref()
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{} (skipped)", self.destination);
        }
        write!(f, "{} <- {}", self.destination, self.source)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("destination", &self.destination)
            .field("source", &self.source)
            .field("explicit", &self.explicit)
            .field("skipped", &self.skipped)
            .field("condition", &self.condition.is_some())
            .field("converter", &self.converter.is_some())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PropertyInfo;
    use serde_json::json;

    fn path(name: &str, value_type: ValueType) -> PropertyPath {
        PropertyPath::root().child(PropertyInfo::new(name, value_type))
    }

    #[test]
    fn test_implicit_mapping() {
        let mapping = Mapping::implicit(
            path("firstName", ValueType::String),
            path("first_name", ValueType::String),
        );

        assert!(!mapping.is_explicit());
        assert_eq!(mapping.source_type(), &ValueType::String);
        assert_eq!(mapping.destination_type(), &ValueType::String);
        assert_eq!(mapping.to_string(), "firstName <- first_name");
    }

    #[test]
    fn test_constant_and_skipped_display() {
        let constant = Mapping::with_source(
            path("age", ValueType::Integer),
            MappingSource::Constant(json!(42)),
            ValueType::Integer,
            true,
        );
        assert_eq!(constant.to_string(), "age <- constant 42");
        assert!(constant.source_path().is_none());

        let skipped = constant.clone().skip();
        assert!(skipped.is_skipped());
        assert_eq!(skipped.to_string(), "age (skipped)");
    }
}
