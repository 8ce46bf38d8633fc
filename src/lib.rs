//! Model Mapping SDK - Object graph mapping between described types
//!
//! Provides:
//! - Type descriptors over `serde_json::Value` instances
//! - Implicit property matching by tokenized names
//! - Explicit overrides through declarative property maps
//! - Cached, thread-safe type maps with conditions, converters and providers
//! - A typed facade for Rust types via serde
//!
//! ```rust,ignore
//! let engine = Engine::new(registry);
//! let type_map = engine.type_map("Order", "OrderDto")?;
//! type_map.add_mappings(&PropertyMap::new().map_value("version", 2))?;
//! type_map.validate()?;
//! let dto = type_map.map(&order)?;
//! ```

pub mod config;
pub mod convert;
pub mod descriptor;
pub mod engine;
pub mod error;
mod lock;
pub mod mapping;
pub mod matching;
pub mod naming;
pub mod path;
pub mod property_map;
pub mod spi;
pub mod typemap;

// Re-export commonly used types
pub use config::{MapperConfig, MatchingStrategy};
pub use convert::{ConverterStore, ScalarConverter};
pub use descriptor::{
    DescriptorCache, Described, PropertyDescriptorProvider, PropertyInfo, TypeDescriptor,
    TypeName, TypeRegistry, ValueType,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{MapperError, MapperResult, UnmappedProperty};
pub use mapping::{Mapping, MappingSource};
pub use matching::{AmbiguousMatch, ImplicitMatch, ImplicitMatcher};
pub use naming::{CamelCaseTokenizer, NameTokenizer};
pub use path::PropertyPath;
pub use property_map::PropertyMap;
pub use spi::{
    Condition, Converter, MappingContext, Provider, ProvisionRequest, condition_fn, conditions,
    converter_fn, provider_fn,
};
pub use typemap::{TypeMap, TypeMapState};
