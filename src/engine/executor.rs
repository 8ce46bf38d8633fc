//! Plan execution: traversal, conversion and assignment

use std::sync::Arc;

use anyhow::{anyhow, bail};
use serde_json::Value;
use tracing::trace;

use super::Engine;
use crate::descriptor::ValueType;
use crate::error::{MapperError, MapperResult};
use crate::mapping::{Mapping, MappingSource};
use crate::path::PropertyPath;
use crate::spi::{MappingContext, Provider, ProvisionRequest};
use crate::typemap::{PlanConfig, TypeMap, TypeMapKey, TypeMapPlan, TypeMapState};

/// Map `source` into a new destination instance
pub(crate) fn map(engine: &Engine, plan: &Arc<TypeMapPlan>, source: &Value) -> MapperResult<Value> {
    if source.is_null() {
        return Err(MapperError::InvalidArgument(
            "source must not be null".to_string(),
        ));
    }
    ensure_validated(engine, plan)?;

    let key = plan.key();
    let config = plan.snapshot();
    let destination_type = ValueType::Object(key.destination.clone());

    // a whole-object converter needs no instance to start from
    let mut destination = if config.converter.is_some() {
        Value::Null
    } else {
        instantiate(engine, &destination_type, config.provider.as_ref(), Some(source))
            .map_err(|e| MapperError::mapping(&key.source, &key.destination, e))?
    };

    execute(engine, plan, &config, source, &mut destination)?;
    Ok(destination)
}

/// Map `source` into the existing `destination` instance
pub(crate) fn map_into(
    engine: &Engine,
    plan: &Arc<TypeMapPlan>,
    source: &Value,
    destination: &mut Value,
) -> MapperResult<()> {
    if source.is_null() {
        return Err(MapperError::InvalidArgument(
            "source must not be null".to_string(),
        ));
    }
    if destination.is_null() {
        return Err(MapperError::InvalidArgument(
            "destination must not be null".to_string(),
        ));
    }
    if !destination.is_object() {
        return Err(MapperError::InvalidArgument(format!(
            "destination must be an object, found {}",
            destination
        )));
    }
    ensure_validated(engine, plan)?;

    let config = plan.snapshot();
    execute(engine, plan, &config, source, destination)
}

fn ensure_validated(engine: &Engine, plan: &Arc<TypeMapPlan>) -> MapperResult<()> {
    if engine.config().validate_on_first_map && !plan.is_validated() {
        TypeMap::new(engine.clone(), plan.clone()).validate()?;
    }
    Ok(())
}

fn execute(
    engine: &Engine,
    plan: &TypeMapPlan,
    config: &PlanConfig,
    source: &Value,
    destination: &mut Value,
) -> MapperResult<()> {
    plan.set_state(TypeMapState::Executing);
    let result = apply(engine, plan.key(), config, source, destination);
    plan.set_state(TypeMapState::Executed);
    result
}

fn apply(
    engine: &Engine,
    key: &TypeMapKey,
    config: &PlanConfig,
    source: &Value,
    destination: &mut Value,
) -> MapperResult<()> {
    let source_type = ValueType::Object(key.source.clone());
    let destination_type = ValueType::Object(key.destination.clone());
    let type_level = |e: anyhow::Error| MapperError::mapping(&key.source, &key.destination, e);

    if let Some(converter) = &config.converter {
        let current = Some(&*destination).filter(|value| !value.is_null());
        let context =
            MappingContext::new(engine, source, current, &source_type, &destination_type);
        let converted = converter.convert(&context).map_err(type_level)?;
        *destination = converted;
        return Ok(());
    }

    if let Some(condition) = &config.condition {
        let context = MappingContext::new(
            engine,
            source,
            Some(&*destination),
            &source_type,
            &destination_type,
        );
        if !condition.applies(&context).map_err(type_level)? {
            trace!(type_map = %key, "Type condition not met, nothing mapped");
            return Ok(());
        }
    }

    for mapping in config.mappings.values() {
        if mapping.is_skipped() {
            continue;
        }
        apply_mapping(engine, config, mapping, source, destination)
            .map_err(|e| MapperError::mapping(mapping.source(), mapping.destination(), e))?;
    }
    Ok(())
}

fn apply_mapping(
    engine: &Engine,
    config: &PlanConfig,
    mapping: &Mapping,
    source: &Value,
    destination: &mut Value,
) -> anyhow::Result<()> {
    let value = match mapping.source() {
        MappingSource::Constant(value) => value,
        MappingSource::Property(path) => match path.read(source) {
            Some(value) => value,
            None => {
                trace!(mapping = %mapping, "Null along source path, skipped");
                return Ok(());
            }
        },
    };

    let current = mapping
        .destination()
        .read(destination)
        .filter(|existing| !existing.is_null())
        .cloned();
    let destination_type = mapping.destination_type();
    let context = MappingContext::new(
        engine,
        value,
        current.as_ref(),
        mapping.source_type(),
        destination_type,
    )
    .for_mapping(mapping, source);

    if let Some(condition) = mapping.condition().or(config.property_condition.as_ref()) {
        if !condition.applies(&context)? {
            trace!(mapping = %mapping, "Condition not met, skipped");
            return Ok(());
        }
    }
    if value.is_null() && engine.config().skip_null_values {
        trace!(mapping = %mapping, "Null source value, skipped");
        return Ok(());
    }

    let provider = mapping.provider().or(config.property_provider.as_ref());
    let converted = match mapping.converter().or(config.property_converter.as_ref()) {
        Some(converter) => converter.convert(&context)?,
        None => convert_value(
            engine,
            value,
            mapping.source_type(),
            destination_type,
            current.as_ref(),
            provider,
        )?,
    };

    write_path(engine, mapping.destination(), destination, converted, provider, source)
}

/// Convert `value` declared as `source_type` into `destination_type`
///
/// Different object types go through their own type map, into `current` when
/// the destination already holds an object.
fn convert_value(
    engine: &Engine,
    value: &Value,
    source_type: &ValueType,
    destination_type: &ValueType,
    current: Option<&Value>,
    provider: Option<&Arc<dyn Provider>>,
) -> anyhow::Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (source_type, destination_type) {
        (ValueType::Object(s), ValueType::Object(d)) if s != d => {
            let plan = engine.plan(&TypeMapKey::new(s.clone(), d.clone(), None))?;
            let mut target = match current {
                Some(existing) if existing.is_object() => existing.clone(),
                _ => {
                    let own = plan.snapshot().provider;
                    instantiate(engine, destination_type, provider.or(own.as_ref()), Some(value))?
                }
            };
            map_into(engine, &plan, value, &mut target)?;
            Ok(target)
        }
        (ValueType::List(s), ValueType::List(d)) => {
            let items = value
                .as_array()
                .ok_or_else(|| anyhow!("expected a list, found {}", value))?;
            items
                .iter()
                .map(|item| convert_value(engine, item, s, d, None, provider))
                .collect::<anyhow::Result<Vec<_>>>()
                .map(Value::Array)
        }
        (s, d) if s == d || *s == ValueType::Any || *d == ValueType::Any => Ok(value.clone()),
        (s, d) => engine.converters().convert(value, s, d),
    }
}

/// New instance of `value_type` from `provider` or by default construction
fn instantiate(
    engine: &Engine,
    value_type: &ValueType,
    provider: Option<&Arc<dyn Provider>>,
    source: Option<&Value>,
) -> anyhow::Result<Value> {
    if let Some(provider) = provider {
        let instance = provider.provide(&ProvisionRequest::new(value_type, source))?;
        if instance.is_null() {
            bail!("provider returned null for {}", value_type);
        }
        return Ok(instance);
    }

    match value_type.object_type() {
        Some(type_name) => {
            let descriptor = engine
                .describe(type_name)
                .ok_or_else(|| anyhow::Error::new(MapperError::UnknownType(type_name.clone())))?;
            descriptor
                .new_instance()
                .ok_or_else(|| anyhow!("{} has no default construction strategy", type_name))
        }
        None => Ok(value_type.default_value()),
    }
}

/// Write `value` at `path`, creating missing intermediate objects
fn write_path(
    engine: &Engine,
    path: &PropertyPath,
    destination: &mut Value,
    value: Value,
    provider: Option<&Arc<dyn Provider>>,
    source: &Value,
) -> anyhow::Result<()> {
    let Some((leaf, intermediates)) = path.properties().split_last() else {
        bail!("cannot assign the destination root");
    };

    let mut current = destination;
    for property in intermediates {
        if property.read(current).is_none_or(Value::is_null) {
            let instance = instantiate(engine, property.value_type(), provider, Some(source))?;
            property.write(current, instance)?;
        }
        current = property
            .read_mut(current)
            .ok_or_else(|| anyhow!("cannot descend into '{}'", property.name()))?;
    }
    leaf.write(current, value)
}
