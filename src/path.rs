//! Property paths: routes from a type's root to a value

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::{PropertyInfo, ValueType};

static NULL: Value = Value::Null;

/// Ordered, immutable sequence of properties starting at a root type
///
/// The empty path denotes the root object itself. Equality and hashing only
/// consider property names and value types.
#[derive(Clone, Default)]
pub struct PropertyPath {
    properties: Arc<[PropertyInfo]>,
}

impl PropertyPath {
    /// The empty path
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(properties: Vec<PropertyInfo>) -> Self {
        Self {
            properties: properties.into(),
        }
    }

    /// New path extended by one property
    pub fn child(&self, property: PropertyInfo) -> Self {
        let mut properties = self.properties.to_vec();
        properties.push(property);
        Self::new(properties)
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_root(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn first(&self) -> Option<&PropertyInfo> {
        self.properties.first()
    }

    pub fn last(&self) -> Option<&PropertyInfo> {
        self.properties.last()
    }

    /// Value type of the last property, `None` for the root path
    pub fn leaf_type(&self) -> Option<&ValueType> {
        self.last().map(PropertyInfo::value_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(PropertyInfo::name)
    }

    /// Whether `prefix` is a leading part of this path (or equal to it)
    pub fn starts_with(&self, prefix: &PropertyPath) -> bool {
        prefix.len() <= self.len() && self.names().zip(prefix.names()).all(|(a, b)| a == b)
    }

    /// Follow the path from `root`.
    ///
    /// Returns `None` when an intermediate value is null or missing. A missing
    /// leaf reads as null.
    pub fn read<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let Some((leaf, intermediates)) = self.properties.split_last() else {
            return Some(root);
        };

        let mut current = root;
        for property in intermediates {
            match property.read(current) {
                Some(value) if !value.is_null() => current = value,
                _ => return None,
            }
        }
        Some(leaf.read(current).unwrap_or(&NULL))
    }
}

impl PartialEq for PropertyPath {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .properties
                .iter()
                .zip(other.properties.iter())
                .all(|(a, b)| a.name() == b.name() && a.value_type() == b.value_type())
    }
}

impl Eq for PropertyPath {}

impl Hash for PropertyPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for property in self.properties.iter() {
            property.name().hash(state);
            property.value_type().hash(state);
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({})", self)
    }
}
