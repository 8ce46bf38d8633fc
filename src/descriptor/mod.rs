//! Type descriptors: the reflective view of a type's properties
//!
//! Instances are `serde_json::Value` trees. A type is a [`TypeName`] plus a
//! [`TypeDescriptor`] listing its properties; [`PropertyInfo`] doubles as the
//! accessor that reads and writes one property of an instance.

mod registry;

use std::fmt;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use registry::{DescriptorCache, PropertyDescriptorProvider, TypeRegistry};

/// Name identifying a described type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Declared type of a property value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Anything; assignable to and from every other type
    Any,
    Bool,
    Integer,
    Float,
    String,
    /// Homogeneous list
    List(Box<ValueType>),
    /// Composite value described by its own [`TypeDescriptor`]
    Object(TypeName),
}

impl ValueType {
    /// Object type with the given name
    pub fn object(name: impl Into<TypeName>) -> Self {
        ValueType::Object(name.into())
    }

    /// List of `element`
    pub fn list(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    /// Bool, integer, float or string
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ValueType::Bool | ValueType::Integer | ValueType::Float | ValueType::String
        )
    }

    /// Name of the object type, if this is one
    pub fn object_type(&self) -> Option<&TypeName> {
        match self {
            ValueType::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Zero value used when default-constructing an object
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Integer => Value::from(0),
            ValueType::Float => Value::from(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::List(_) => Value::Array(Vec::new()),
            ValueType::Any | ValueType::Object(_) => Value::Null,
        }
    }

    /// Runtime type of a value; objects and nulls carry no type name
    pub fn of_value(value: &Value) -> ValueType {
        match value {
            Value::Bool(_) => ValueType::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueType::Integer,
            Value::Number(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::list(ValueType::Any),
            Value::Null | Value::Object(_) => ValueType::Any,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::List(element) => write!(f, "list<{}>", element),
            ValueType::Object(name) => write!(f, "{}", name),
        }
    }
}

/// One accessible property of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyInfo {
    name: String,
    value_type: ValueType,
    readable: bool,
    writable: bool,
}

impl PropertyInfo {
    /// Readable and writable property
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            readable: true,
            writable: true,
        }
    }

    /// Mark the property as read-only
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Mark the property as write-only
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read the property from `instance`; `None` when the instance is not an
    /// object or does not hold the property
    pub fn read<'v>(&self, instance: &'v Value) -> Option<&'v Value> {
        instance.as_object()?.get(&self.name)
    }

    pub(crate) fn read_mut<'v>(&self, instance: &'v mut Value) -> Option<&'v mut Value> {
        instance.as_object_mut()?.get_mut(&self.name)
    }

    /// Write `value` into `instance`
    pub fn write(&self, instance: &mut Value, value: Value) -> anyhow::Result<()> {
        if !self.writable {
            bail!("property '{}' is not writable", self.name);
        }
        match instance.as_object_mut() {
            Some(object) => {
                object.insert(self.name.clone(), value);
                Ok(())
            }
            None => bail!(
                "cannot write property '{}' into a non-object value",
                self.name
            ),
        }
    }
}

/// Shape of a type: its name and ordered properties
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    name: TypeName,
    properties: Vec<PropertyInfo>,
    constructible: bool,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            constructible: true,
        }
    }

    /// Add a readable and writable property
    pub fn property(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with_property(PropertyInfo::new(name, value_type))
    }

    /// Add a fully specified property
    pub fn with_property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    /// The type has no default construction strategy; instances must come
    /// from a provider
    pub fn not_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn is_constructible(&self) -> bool {
        self.constructible
    }

    /// All properties with the given name (more than one means ambiguity)
    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PropertyInfo> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    /// Default-construct an instance, `None` if the type is not constructible
    pub fn new_instance(&self) -> Option<Value> {
        if !self.constructible {
            return None;
        }
        let object: Map<String, Value> = self
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value_type.default_value()))
            .collect();
        Some(Value::Object(object))
    }
}

/// Rust types that can describe their own shape
///
/// Used together with serde by [`Engine::map`](crate::Engine::map).
pub trait Described {
    fn type_descriptor() -> TypeDescriptor;

    fn type_name() -> TypeName {
        Self::type_descriptor().name().clone()
    }
}
