//! Type maps: cached mapping plans for one source/destination type pair
//!
//! A [`TypeMap`] is a cheap handle onto a shared plan owned by the engine's
//! [`TypeMapStore`]. Every handle for the same key refers to the same plan,
//! so configuration made through one handle is visible through all others.

mod store;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::descriptor::{PropertyInfo, TypeName};
use crate::engine::{Engine, executor};
use crate::error::{MapperError, MapperResult, UnmappedProperty};
use crate::lock;
use crate::mapping::Mapping;
use crate::path::PropertyPath;
use crate::property_map::PropertyMap;
use crate::spi::{Condition, Converter, Provider};

pub(crate) use store::TypeMapStore;

/// Lifecycle of a type map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeMapState {
    /// Registered in the store, implicit matching not finished
    #[default]
    Unbuilt,
    /// Holds the implicit mappings
    Built,
    /// Explicit mappings or settings were added
    Configured,
    /// A `map` call is in progress
    Executing,
    /// At least one `map` call has completed
    Executed,
}

impl fmt::Display for TypeMapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TypeMapState::Unbuilt => "unbuilt",
            TypeMapState::Built => "built",
            TypeMapState::Configured => "configured",
            TypeMapState::Executing => "executing",
            TypeMapState::Executed => "executed",
        };
        f.write_str(state)
    }
}

/// Cache key of a type map
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TypeMapKey {
    pub(crate) source: TypeName,
    pub(crate) destination: TypeName,
    pub(crate) name: Option<String>,
}

impl TypeMapKey {
    pub(crate) fn new(source: TypeName, destination: TypeName, name: Option<String>) -> Self {
        Self {
            source,
            destination,
            name,
        }
    }
}

impl fmt::Display for TypeMapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeMap[{} -> {}", self.source, self.destination)?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        f.write_str("]")
    }
}

/// Mutable content of a plan; cloning is cheap
#[derive(Clone, Default)]
pub(crate) struct PlanConfig {
    pub(crate) state: TypeMapState,
    pub(crate) mappings: Arc<IndexMap<PropertyPath, Mapping>>,
    pub(crate) condition: Option<Arc<dyn Condition>>,
    pub(crate) converter: Option<Arc<dyn Converter>>,
    pub(crate) provider: Option<Arc<dyn Provider>>,
    pub(crate) property_condition: Option<Arc<dyn Condition>>,
    pub(crate) property_converter: Option<Arc<dyn Converter>>,
    pub(crate) property_provider: Option<Arc<dyn Provider>>,
}

/// Shared plan behind every [`TypeMap`] handle of one key
pub(crate) struct TypeMapPlan {
    key: TypeMapKey,
    config: RwLock<PlanConfig>,
    ready: Mutex<bool>,
    ready_signal: Condvar,
    validated: AtomicBool,
}

impl TypeMapPlan {
    pub(crate) fn new(key: TypeMapKey) -> Self {
        Self {
            key,
            config: RwLock::new(PlanConfig::default()),
            ready: Mutex::new(false),
            ready_signal: Condvar::new(),
            validated: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &TypeMapKey {
        &self.key
    }

    /// Point-in-time copy of the configuration
    pub(crate) fn snapshot(&self) -> PlanConfig {
        lock::read(&self.config).clone()
    }

    pub(crate) fn update<R>(&self, apply: impl FnOnce(&mut PlanConfig) -> R) -> R {
        apply(&mut lock::write(&self.config))
    }

    pub(crate) fn set_state(&self, state: TypeMapState) {
        self.update(|config| config.state = state);
    }

    /// Mark user configuration; execution states are kept
    fn touch(config: &mut PlanConfig) {
        if config.state < TypeMapState::Configured {
            config.state = TypeMapState::Configured;
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        *lock::lock(&self.ready)
    }

    pub(crate) fn mark_ready(&self) {
        *lock::lock(&self.ready) = true;
        self.ready_signal.notify_all();
    }

    /// Block until the building thread has published the plan
    pub(crate) fn wait_ready(&self) {
        let mut ready = lock::lock(&self.ready);
        while !*ready {
            ready = self
                .ready_signal
                .wait(ready)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn is_validated(&self) -> bool {
        self.validated.load(Ordering::Acquire)
    }
}

/// Mapping plan for one (source, destination[, name]) type pair
///
/// Obtained from [`Engine::type_map`]. Setters return the handle so calls can
/// be chained:
///
/// ```rust,ignore
/// engine
///     .type_map("Order", "OrderDto")?
///     .add_mappings(&PropertyMap::new().map_value("version", 2))?
///     .set_property_condition(conditions::is_not_null());
/// ```
#[derive(Clone)]
pub struct TypeMap {
    engine: Engine,
    plan: Arc<TypeMapPlan>,
}

impl TypeMap {
    pub(crate) fn new(engine: Engine, plan: Arc<TypeMapPlan>) -> Self {
        Self { engine, plan }
    }

    pub fn source_type(&self) -> &TypeName {
        &self.plan.key.source
    }

    pub fn destination_type(&self) -> &TypeName {
        &self.plan.key.destination
    }

    pub fn name(&self) -> Option<&str> {
        self.plan.key.name.as_deref()
    }

    pub fn state(&self) -> TypeMapState {
        lock::read(&self.plan.config).state
    }

    /// Whether both handles refer to the same cached plan
    pub fn ptr_eq(&self, other: &TypeMap) -> bool {
        Arc::ptr_eq(&self.plan, &other.plan)
    }

    /// Snapshot of the mappings in execution order
    pub fn mappings(&self) -> Vec<Mapping> {
        lock::read(&self.plan.config)
            .mappings
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of the top-level destination properties without a mapping
    ///
    /// Empty when a type-level converter is set. A property counts as mapped
    /// when any mapping targets it or a path below it.
    pub fn unmapped_properties(&self) -> Vec<PropertyInfo> {
        let config = self.plan.snapshot();
        if config.converter.is_some() {
            return Vec::new();
        }
        let Some(descriptor) = self.engine.describe(self.destination_type()) else {
            return Vec::new();
        };

        descriptor
            .properties()
            .iter()
            .filter(|property| property.is_writable())
            .filter(|property| {
                !config
                    .mappings
                    .keys()
                    .any(|path| path.first().is_some_and(|first| first == *property))
            })
            .cloned()
            .collect()
    }

    /// Fail unless every top-level destination property is mapped or a
    /// type-level converter is set
    pub fn validate(&self) -> MapperResult<()> {
        let unmapped = self.unmapped();
        if !unmapped.is_empty() {
            return Err(MapperError::Validation { unmapped });
        }
        self.plan.validated.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn unmapped(&self) -> Vec<UnmappedProperty> {
        let type_map = self.to_string();
        self.unmapped_properties()
            .into_iter()
            .map(|property| UnmappedProperty {
                type_map: type_map.clone(),
                property: property.name().to_string(),
            })
            .collect()
    }

    /// Add explicit mappings, replacing mappings with the same destination
    ///
    /// Every entry is resolved before the plan is touched; on error nothing
    /// changes and all resolution problems are reported together.
    pub fn add_mappings(&self, property_map: &PropertyMap) -> MapperResult<&Self> {
        let resolved = property_map
            .resolve(
                self.source_type(),
                self.destination_type(),
                self.engine.descriptors(),
            )
            .map_err(|messages| MapperError::configuration(self, messages))?;

        self.plan.update(|config| {
            let mappings = Arc::make_mut(&mut config.mappings);
            for mapping in resolved {
                let destination = mapping.destination().clone();
                // Implicit mappings below an explicit destination would be
                // overwritten or must stay unwritten when it is skipped
                mappings.retain(|path, existing| {
                    existing.is_explicit()
                        || path.len() <= destination.len()
                        || !path.starts_with(&destination)
                });
                if let Some(replaced) = mappings.shift_remove(&destination) {
                    debug!(type_map = %self, mapping = %replaced, "Explicit mapping replaces existing one");
                }
                mappings.insert(destination, mapping);
            }
            TypeMapPlan::touch(config);
        });

        debug!(type_map = %self, added = property_map.len(), "Added explicit mappings");
        Ok(self)
    }

    /// Map `source` into a new destination instance
    pub fn map(&self, source: &serde_json::Value) -> MapperResult<serde_json::Value> {
        executor::map(&self.engine, &self.plan, source)
    }

    /// Map `source` into the existing `destination` instance
    pub fn map_into(
        &self,
        source: &serde_json::Value,
        destination: &mut serde_json::Value,
    ) -> MapperResult<()> {
        executor::map_into(&self.engine, &self.plan, source, destination)
    }

    /// Whole-object condition; when it fails `map` leaves the destination untouched
    pub fn set_condition(&self, condition: Arc<dyn Condition>) -> &Self {
        self.configure(|config| config.condition = Some(condition))
    }

    /// Whole-object converter; replaces property traversal entirely
    pub fn set_converter(&self, converter: Arc<dyn Converter>) -> &Self {
        self.configure(|config| config.converter = Some(converter))
    }

    /// Creates destination instances for this pair
    pub fn set_provider(&self, provider: Arc<dyn Provider>) -> &Self {
        self.configure(|config| config.provider = Some(provider))
    }

    /// Default condition for mappings without their own
    pub fn set_property_condition(&self, condition: Arc<dyn Condition>) -> &Self {
        self.configure(|config| config.property_condition = Some(condition))
    }

    /// Default converter for mappings without their own
    pub fn set_property_converter(&self, converter: Arc<dyn Converter>) -> &Self {
        self.configure(|config| config.property_converter = Some(converter))
    }

    /// Default provider for nested and intermediate instances
    pub fn set_property_provider(&self, provider: Arc<dyn Provider>) -> &Self {
        self.configure(|config| config.property_provider = Some(provider))
    }

    pub fn condition(&self) -> Option<Arc<dyn Condition>> {
        lock::read(&self.plan.config).condition.clone()
    }

    pub fn converter(&self) -> Option<Arc<dyn Converter>> {
        lock::read(&self.plan.config).converter.clone()
    }

    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        lock::read(&self.plan.config).provider.clone()
    }

    pub fn property_condition(&self) -> Option<Arc<dyn Condition>> {
        lock::read(&self.plan.config).property_condition.clone()
    }

    pub fn property_converter(&self) -> Option<Arc<dyn Converter>> {
        lock::read(&self.plan.config).property_converter.clone()
    }

    pub fn property_provider(&self) -> Option<Arc<dyn Provider>> {
        lock::read(&self.plan.config).property_provider.clone()
    }

    fn configure(&self, apply: impl FnOnce(&mut PlanConfig)) -> &Self {
        self.plan.update(|config| {
            apply(config);
            TypeMapPlan::touch(config);
        });
        self
    }
}

impl fmt::Display for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.plan.key, f)
    }
}

impl fmt::Debug for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.plan.snapshot();
        f.debug_struct("TypeMap")
            .field("key", &self.plan.key)
            .field("state", &config.state)
            .field("mappings", &config.mappings.len())
            .finish()
    }
}
