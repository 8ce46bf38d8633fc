//! Mapping engine: owns the caches and entry points
//!
//! An [`Engine`] holds the configuration, the memoized type descriptors, the
//! naming convention, the scalar converters and the [`TypeMap`] cache.
//! Engines are independent of each other; clones share all state.

pub(crate) mod executor;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::MapperConfig;
use crate::convert::ConverterStore;
use crate::descriptor::{
    DescriptorCache, Described, PropertyDescriptorProvider, TypeDescriptor, TypeName,
    TypeRegistry, ValueType,
};
use crate::error::{MapperError, MapperResult};
use crate::mapping::Mapping;
use crate::matching::ImplicitMatcher;
use crate::naming::{CamelCaseTokenizer, NameTokenizer};
use crate::typemap::{TypeMap, TypeMapKey, TypeMapPlan, TypeMapState, TypeMapStore};

struct EngineShared {
    config: MapperConfig,
    descriptors: DescriptorCache,
    tokenizer: Box<dyn NameTokenizer>,
    converters: ConverterStore,
    store: TypeMapStore,
}

/// Entry point for building type maps and mapping values
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

/// Builder for an [`Engine`] with non-default collaborators
pub struct EngineBuilder {
    config: MapperConfig,
    provider: Option<Box<dyn PropertyDescriptorProvider>>,
    tokenizer: Box<dyn NameTokenizer>,
    converters: ConverterStore,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: MapperConfig::default(),
            provider: None,
            tokenizer: Box::new(CamelCaseTokenizer),
            converters: ConverterStore::new(),
        }
    }
}

impl EngineBuilder {
    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Describe types from an explicit registry
    pub fn with_registry(self, registry: TypeRegistry) -> Self {
        self.with_provider(registry)
    }

    /// Describe types through any descriptor provider
    pub fn with_provider(mut self, provider: impl PropertyDescriptorProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl NameTokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    pub fn with_converter_store(mut self, converters: ConverterStore) -> Self {
        self.converters = converters;
        self
    }

    pub fn build(self) -> Engine {
        let provider = self
            .provider
            .unwrap_or_else(|| Box::new(TypeRegistry::new()));
        Engine {
            shared: Arc::new(EngineShared {
                config: self.config,
                descriptors: DescriptorCache::from_boxed(provider),
                tokenizer: self.tokenizer,
                converters: self.converters,
                store: TypeMapStore::new(),
            }),
        }
    }
}

impl Engine {
    /// Engine with default configuration over `registry`
    pub fn new(registry: TypeRegistry) -> Self {
        Self::builder().with_registry(registry).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &MapperConfig {
        &self.shared.config
    }

    /// Memoized descriptor of `type_name`
    pub fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>> {
        self.shared.descriptors.describe(type_name)
    }

    pub(crate) fn descriptors(&self) -> &DescriptorCache {
        &self.shared.descriptors
    }

    pub(crate) fn converters(&self) -> &ConverterStore {
        &self.shared.converters
    }

    /// Type map for the pair, built on first request
    pub fn type_map(
        &self,
        source: impl Into<TypeName>,
        destination: impl Into<TypeName>,
    ) -> MapperResult<TypeMap> {
        let key = TypeMapKey::new(source.into(), destination.into(), None);
        self.plan(&key).map(|plan| TypeMap::new(self.clone(), plan))
    }

    /// Named type map for the pair, independent of the unnamed one
    pub fn type_map_named(
        &self,
        source: impl Into<TypeName>,
        destination: impl Into<TypeName>,
        name: impl Into<String>,
    ) -> MapperResult<TypeMap> {
        let key = TypeMapKey::new(source.into(), destination.into(), Some(name.into()));
        self.plan(&key).map(|plan| TypeMap::new(self.clone(), plan))
    }

    /// Cached type map for the pair; never builds one
    pub fn get_type_map(
        &self,
        source: &TypeName,
        destination: &TypeName,
        name: Option<&str>,
    ) -> Option<TypeMap> {
        let key = TypeMapKey::new(
            source.clone(),
            destination.clone(),
            name.map(str::to_string),
        );
        self.shared
            .store
            .get(&key)
            .map(|plan| TypeMap::new(self.clone(), plan))
    }

    /// Snapshot of every cached type map, ordered by source, destination, name
    pub fn type_maps(&self) -> Vec<TypeMap> {
        self.shared
            .store
            .all()
            .into_iter()
            .map(|plan| TypeMap::new(self.clone(), plan))
            .collect()
    }

    /// Validate every cached type map, reporting all unmapped properties
    pub fn validate(&self) -> MapperResult<()> {
        let unmapped: Vec<_> = self
            .type_maps()
            .iter()
            .flat_map(TypeMap::unmapped)
            .collect();
        if unmapped.is_empty() {
            Ok(())
        } else {
            Err(MapperError::Validation { unmapped })
        }
    }

    /// Map `source` of type `source_type` into a new `destination_type` value
    pub fn map_value(
        &self,
        source: &Value,
        source_type: &TypeName,
        destination_type: &TypeName,
    ) -> MapperResult<Value> {
        self.type_map(source_type.clone(), destination_type.clone())?
            .map(source)
    }

    /// Map `source` of type `source_type` into an existing destination value
    pub fn map_value_into(
        &self,
        source: &Value,
        destination: &mut Value,
        source_type: &TypeName,
        destination_type: &TypeName,
    ) -> MapperResult<()> {
        self.type_map(source_type.clone(), destination_type.clone())?
            .map_into(source, destination)
    }

    /// Map between described Rust types through their JSON form
    pub fn map<S, D>(&self, source: &S) -> MapperResult<D>
    where
        S: Described + Serialize,
        D: Described + DeserializeOwned,
    {
        let source = serde_json::to_value(source)?;
        let mapped = self.map_value(&source, &S::type_name(), &D::type_name())?;
        Ok(serde_json::from_value(mapped)?)
    }

    /// Map into an existing described Rust value
    pub fn map_into<S, D>(&self, source: &S, destination: &mut D) -> MapperResult<()>
    where
        S: Described + Serialize,
        D: Described + Serialize + DeserializeOwned,
    {
        let source = serde_json::to_value(source)?;
        let mut target = serde_json::to_value(&*destination)?;
        self.map_value_into(&source, &mut target, &S::type_name(), &D::type_name())?;
        *destination = serde_json::from_value(target)?;
        Ok(())
    }

    /// Cached plan for `key`, building it and its nested plans on first request
    pub(crate) fn plan(&self, key: &TypeMapKey) -> MapperResult<Arc<TypeMapPlan>> {
        for type_name in [&key.source, &key.destination] {
            if self.describe(type_name).is_none() {
                return Err(MapperError::UnknownType(type_name.clone()));
            }
        }
        Ok(self
            .shared
            .store
            .get_or_build(key, |plan| self.build_plan(plan)))
    }

    fn build_plan(&self, plan: &Arc<TypeMapPlan>) {
        let key = plan.key();
        let config = self.config();
        let mut mappings = IndexMap::new();
        let mut nested = Vec::new();

        if config.implicit_matching {
            let matched = ImplicitMatcher::new(
                &self.shared.descriptors,
                self.shared.tokenizer.as_ref(),
                &self.shared.converters,
            )
            .with_strategy(config.matching_strategy)
            .with_max_depth(config.max_depth)
            .with_closeness_ranking(config.rank_by_closeness)
            .match_types(&key.source, &key.destination);

            for (destination, source) in matched.mappings {
                if let (Some(s), Some(d)) = (source.leaf_type(), destination.leaf_type()) {
                    collect_nested_pairs(s, d, &mut nested);
                }
                mappings.insert(destination.clone(), Mapping::implicit(destination, source));
            }
            debug!(
                type_map = %key,
                mappings = mappings.len(),
                ambiguous = matched.ambiguous.len(),
                "Built type map"
            );
        } else {
            debug!(type_map = %key, "Built type map without implicit matching");
        }

        plan.update(|plan_config| {
            plan_config.mappings = Arc::new(mappings);
            plan_config.state = TypeMapState::Built;
        });

        for (source, destination) in nested {
            let nested_key = TypeMapKey::new(source, destination, None);
            if let Err(e) = self.plan(&nested_key) {
                debug!(type_map = %key, nested = %nested_key, error = %e, "Nested type map not built");
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("descriptors", &self.shared.descriptors.len())
            .field("type_maps", &self.shared.store.len())
            .finish()
    }
}

/// Object type pairs that need their own type map to map `source` to `destination`
fn collect_nested_pairs(
    source: &ValueType,
    destination: &ValueType,
    pairs: &mut Vec<(TypeName, TypeName)>,
) {
    match (source, destination) {
        (ValueType::Object(s), ValueType::Object(d)) if s != d => {
            pairs.push((s.clone(), d.clone()));
        }
        (ValueType::List(s), ValueType::List(d)) => collect_nested_pairs(s, d, pairs),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingStrategy;
    use crate::descriptor::TypeDescriptor;
    use serde::Deserialize;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                TypeDescriptor::new("Node")
                    .property("value", ValueType::Integer)
                    .property("next", ValueType::object("Node")),
            )
            .with_type(
                TypeDescriptor::new("NodeDto")
                    .property("value", ValueType::Integer)
                    .property("next", ValueType::object("NodeDto")),
            )
    }

    #[test]
    fn test_type_map_is_cached() {
        let engine = Engine::new(registry());
        let first = engine.type_map("Node", "NodeDto").unwrap();
        let second = engine.type_map("Node", "NodeDto").unwrap();
        let named = engine.type_map_named("Node", "NodeDto", "shallow").unwrap();

        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&named));
        assert_eq!(named.name(), Some("shallow"));
        assert!(
            engine
                .get_type_map(&"Node".into(), &"NodeDto".into(), None)
                .unwrap()
                .ptr_eq(&first)
        );
    }

    #[test]
    fn test_get_type_map_never_builds() {
        let engine = Engine::new(registry());
        assert!(engine.get_type_map(&"Node".into(), &"NodeDto".into(), None).is_none());
        assert!(engine.type_maps().is_empty());
    }

    #[test]
    fn test_unknown_type() {
        let engine = Engine::new(registry());
        let err = engine.type_map("Node", "Missing").unwrap_err();
        assert!(matches!(err, MapperError::UnknownType(name) if name.as_str() == "Missing"));
    }

    #[test]
    fn test_self_referential_types() {
        let engine = Engine::new(registry());
        let type_map = engine.type_map("Node", "NodeDto").unwrap();

        let rendered: Vec<String> = type_map.mappings().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["value <- value", "next <- next"]);
        // the nested pair is the plan itself
        assert_eq!(engine.type_maps().len(), 1);

        let mapped = type_map
            .map(&json!({"value": 1, "next": {"value": 2, "next": null}}))
            .unwrap();
        assert_eq!(mapped, json!({"value": 1, "next": {"value": 2, "next": null}}));
    }

    #[test]
    fn test_implicit_matching_disabled() {
        let engine = Engine::builder()
            .with_registry(registry())
            .with_config(MapperConfig::new().with_implicit_matching(false))
            .build();
        let type_map = engine.type_map("Node", "NodeDto").unwrap();
        assert!(type_map.mappings().is_empty());
        assert_eq!(type_map.unmapped_properties().len(), 2);
    }

    #[test]
    fn test_config_is_exposed() {
        let engine = Engine::builder()
            .with_config(MapperConfig::strict())
            .build();
        assert_eq!(engine.config().matching_strategy, MatchingStrategy::Strict);
        assert!(engine.describe(&"Node".into()).is_none());
    }

    #[derive(Debug, Serialize)]
    struct Account {
        owner_name: String,
        balance: i64,
    }

    impl Described for Account {
        fn type_descriptor() -> TypeDescriptor {
            TypeDescriptor::new("Account")
                .property("owner_name", ValueType::String)
                .property("balance", ValueType::Integer)
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct AccountView {
        owner_name: String,
        balance: f64,
    }

    impl Described for AccountView {
        fn type_descriptor() -> TypeDescriptor {
            TypeDescriptor::new("AccountView")
                .property("ownerName", ValueType::String)
                .property("balance", ValueType::Float)
        }
    }

    #[test]
    fn test_typed_facade() {
        let engine = Engine::new(
            TypeRegistry::new()
                .with_described::<Account>()
                .with_described::<AccountView>(),
        );
        let account = Account {
            owner_name: "Ada".to_string(),
            balance: 12,
        };

        let view: AccountView = engine.map(&account).unwrap();
        assert_eq!(
            view,
            AccountView {
                owner_name: "Ada".to_string(),
                balance: 12.0,
            }
        );

        let mut existing = AccountView::default();
        engine.map_into(&account, &mut existing).unwrap();
        assert_eq!(existing, view);
    }
}
