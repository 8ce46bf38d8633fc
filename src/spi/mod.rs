//! Extension points: conditions, converters and providers
//!
//! Each capability is a single-method trait. Closures are adapted through
//! [`condition_fn`], [`converter_fn`] and [`provider_fn`]; the engine stores
//! them as shared trait objects.

pub mod conditions;

use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::{TypeName, ValueType};
use crate::engine::Engine;
use crate::error::MapperResult;
use crate::mapping::Mapping;

/// Predicate deciding whether a mapping (or a whole type map) applies
pub trait Condition: Send + Sync {
    fn applies(&self, context: &MappingContext<'_>) -> anyhow::Result<bool>;
}

/// Produces the destination value from the context's source value
pub trait Converter: Send + Sync {
    fn convert(&self, context: &MappingContext<'_>) -> anyhow::Result<Value>;
}

/// Creates destination instances the engine has no existing value for
pub trait Provider: Send + Sync {
    fn provide(&self, request: &ProvisionRequest<'_>) -> anyhow::Result<Value>;
}

/// What the engine knows while applying one mapping
pub struct MappingContext<'a> {
    engine: &'a Engine,
    source: &'a Value,
    destination: Option<&'a Value>,
    source_type: &'a ValueType,
    destination_type: &'a ValueType,
    mapping: Option<&'a Mapping>,
    parent_source: Option<&'a Value>,
}

impl<'a> MappingContext<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        source: &'a Value,
        destination: Option<&'a Value>,
        source_type: &'a ValueType,
        destination_type: &'a ValueType,
    ) -> Self {
        Self {
            engine,
            source,
            destination,
            source_type,
            destination_type,
            mapping: None,
            parent_source: None,
        }
    }

    pub(crate) fn for_mapping(mut self, mapping: &'a Mapping, parent_source: &'a Value) -> Self {
        self.mapping = Some(mapping);
        self.parent_source = Some(parent_source);
        self
    }

    /// Resolved source value
    pub fn source(&self) -> &'a Value {
        self.source
    }

    /// Current destination value, `None` when there is none yet
    pub fn destination(&self) -> Option<&'a Value> {
        self.destination
    }

    pub fn source_type(&self) -> &'a ValueType {
        self.source_type
    }

    pub fn destination_type(&self) -> &'a ValueType {
        self.destination_type
    }

    /// Mapping being applied; `None` for type-level conditions and converters
    pub fn mapping(&self) -> Option<&'a Mapping> {
        self.mapping
    }

    /// Source object the mapped value was read from
    pub fn parent_source(&self) -> Option<&'a Value> {
        self.parent_source
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Map `value` through the engine's type map for the given pair
    pub fn map(
        &self,
        value: &Value,
        source_type: &TypeName,
        destination_type: &TypeName,
    ) -> MapperResult<Value> {
        self.engine.map_value(value, source_type, destination_type)
    }
}

/// Request for a new instance
pub struct ProvisionRequest<'a> {
    requested_type: &'a ValueType,
    source: Option<&'a Value>,
}

impl<'a> ProvisionRequest<'a> {
    pub(crate) fn new(requested_type: &'a ValueType, source: Option<&'a Value>) -> Self {
        Self {
            requested_type,
            source,
        }
    }

    pub fn requested_type(&self) -> &'a ValueType {
        self.requested_type
    }

    /// Source value the instance is created for, if known
    pub fn source(&self) -> Option<&'a Value> {
        self.source
    }
}

struct FnCondition<F>(F);

impl<F> Condition for FnCondition<F>
where
    F: Fn(&MappingContext<'_>) -> anyhow::Result<bool> + Send + Sync,
{
    fn applies(&self, context: &MappingContext<'_>) -> anyhow::Result<bool> {
        (self.0)(context)
    }
}

struct FnConverter<F>(F);

impl<F> Converter for FnConverter<F>
where
    F: Fn(&MappingContext<'_>) -> anyhow::Result<Value> + Send + Sync,
{
    fn convert(&self, context: &MappingContext<'_>) -> anyhow::Result<Value> {
        (self.0)(context)
    }
}

struct FnProvider<F>(F);

impl<F> Provider for FnProvider<F>
where
    F: Fn(&ProvisionRequest<'_>) -> anyhow::Result<Value> + Send + Sync,
{
    fn provide(&self, request: &ProvisionRequest<'_>) -> anyhow::Result<Value> {
        (self.0)(request)
    }
}

/// Condition from a closure
pub fn condition_fn<F>(f: F) -> Arc<dyn Condition>
where
    F: Fn(&MappingContext<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    Arc::new(FnCondition(f))
}

/// Converter from a closure
pub fn converter_fn<F>(f: F) -> Arc<dyn Converter>
where
    F: Fn(&MappingContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnConverter(f))
}

/// Provider from a closure
pub fn provider_fn<F>(f: F) -> Arc<dyn Provider>
where
    F: Fn(&ProvisionRequest<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnProvider(f))
}
