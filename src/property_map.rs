//! Declarative explicit mappings
//!
//! A [`PropertyMap`] lists destination paths and where their values come
//! from. Paths are dotted property names (`address.city`); the empty source
//! path stands for the whole source object.
//!
//! ```rust,ignore
//! let overrides = PropertyMap::new()
//!     .map("fullAddress.city", "location.town")
//!     .map_value("age", 42)
//!     .skip("internalId")
//!     .map("displayName", "")
//!     .with_converter(converter_fn(|ctx| Ok(json!(ctx.source()["name"]))));
//! type_map.add_mappings(&overrides)?;
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::{PropertyDescriptorProvider, TypeName, ValueType};
use crate::mapping::{Mapping, MappingSource};
use crate::path::PropertyPath;
use crate::spi::{Condition, Converter, Provider};

#[derive(Clone)]
enum DeclaredSource {
    Path(String),
    Constant(Value),
    Skip,
}

#[derive(Clone)]
struct PropertyMapping {
    destination: String,
    source: DeclaredSource,
    condition: Option<Arc<dyn Condition>>,
    converter: Option<Arc<dyn Converter>>,
    provider: Option<Arc<dyn Provider>>,
}

/// Builder of explicit destination-to-source bindings
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<PropertyMapping>,
    errors: Vec<String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the destination path from a source path
    pub fn map(self, destination: impl Into<String>, source: impl Into<String>) -> Self {
        self.push(destination.into(), DeclaredSource::Path(source.into()))
    }

    /// Always write `value` to the destination path
    pub fn map_value(self, destination: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(destination.into(), DeclaredSource::Constant(value.into()))
    }

    /// Never write the destination path, but treat it as mapped
    pub fn skip(self, destination: impl Into<String>) -> Self {
        self.push(destination.into(), DeclaredSource::Skip)
    }

    /// Condition for the most recently declared mapping
    pub fn with_condition(self, condition: Arc<dyn Condition>) -> Self {
        self.decorate("with_condition", |entry| entry.condition = Some(condition))
    }

    /// Converter for the most recently declared mapping
    pub fn with_converter(self, converter: Arc<dyn Converter>) -> Self {
        self.decorate("with_converter", |entry| entry.converter = Some(converter))
    }

    /// Provider for the most recently declared mapping
    pub fn with_provider(self, provider: Arc<dyn Provider>) -> Self {
        self.decorate("with_provider", |entry| entry.provider = Some(provider))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(mut self, destination: String, source: DeclaredSource) -> Self {
        self.entries.push(PropertyMapping {
            destination,
            source,
            condition: None,
            converter: None,
            provider: None,
        });
        self
    }

    fn decorate(mut self, method: &str, apply: impl FnOnce(&mut PropertyMapping)) -> Self {
        match self.entries.last_mut() {
            Some(entry) => apply(entry),
            None => self
                .errors
                .push(format!("{} called before any mapping was declared", method)),
        }
        self
    }

    /// Resolve every entry against the descriptors, collecting all errors
    pub(crate) fn resolve(
        &self,
        source_type: &TypeName,
        destination_type: &TypeName,
        descriptors: &dyn PropertyDescriptorProvider,
    ) -> Result<Vec<Mapping>, Vec<String>> {
        let mut errors = self.errors.clone();
        let mut mappings = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let destination = match resolve_path(
                descriptors,
                destination_type,
                &entry.destination,
                Access::Write,
            ) {
                Ok(path) if path.is_root() => {
                    errors.push("destination path must not be empty".to_string());
                    continue;
                }
                Ok(path) => path,
                Err(e) => {
                    errors.push(format!("{}: {}", entry.destination, e));
                    continue;
                }
            };

            let mapping = match &entry.source {
                DeclaredSource::Path(path) => {
                    match resolve_path(descriptors, source_type, path, Access::Read) {
                        Ok(source) => {
                            let declared = source
                                .leaf_type()
                                .cloned()
                                .unwrap_or_else(|| ValueType::Object(source_type.clone()));
                            Mapping::with_source(
                                destination,
                                MappingSource::Property(source),
                                declared,
                                true,
                            )
                        }
                        Err(e) => {
                            errors.push(format!("{} <- {}: {}", entry.destination, path, e));
                            continue;
                        }
                    }
                }
                DeclaredSource::Constant(value) => Mapping::with_source(
                    destination,
                    MappingSource::Constant(value.clone()),
                    ValueType::of_value(value),
                    true,
                ),
                DeclaredSource::Skip => Mapping::with_source(
                    destination,
                    MappingSource::Property(PropertyPath::root()),
                    ValueType::Object(source_type.clone()),
                    true,
                )
                .skip(),
            };

            let mut mapping = mapping;
            mapping.condition = entry.condition.clone();
            mapping.converter = entry.converter.clone();
            mapping.provider = entry.provider.clone();
            mappings.push(mapping);
        }

        if errors.is_empty() {
            Ok(mappings)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

fn resolve_path(
    descriptors: &dyn PropertyDescriptorProvider,
    root: &TypeName,
    path: &str,
    access: Access,
) -> Result<PropertyPath, String> {
    let mut resolved = PropertyPath::root();
    if path.is_empty() {
        return Ok(resolved);
    }

    let segments: Vec<&str> = path.split('.').collect();
    let mut current = ValueType::Object(root.clone());

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(format!("'{}' contains an empty segment", path));
        }
        let type_name = current
            .object_type()
            .ok_or_else(|| format!("'{}' is not an object property", resolved))?;
        let descriptor = descriptors
            .describe(type_name)
            .ok_or_else(|| format!("unknown type {}", type_name))?;

        let mut named = descriptor.properties_named(segment);
        let property = match (named.next(), named.next()) {
            (Some(property), None) => property.clone(),
            (None, _) => return Err(format!("no property '{}' on {}", segment, type_name)),
            (Some(_), Some(_)) => {
                return Err(format!("ambiguous property '{}' on {}", segment, type_name));
            }
        };

        let is_leaf = i + 1 == segments.len();
        if access == Access::Read && !property.is_readable() {
            return Err(format!("property '{}' on {} is not readable", segment, type_name));
        }
        if access == Access::Write && is_leaf && !property.is_writable() {
            return Err(format!("property '{}' on {} is not writable", segment, type_name));
        }

        current = property.value_type().clone();
        resolved = resolved.child(property);
    }

    Ok(resolved)
}
