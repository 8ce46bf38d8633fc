//! Built-in scalar conversions
//!
//! Consulted when a mapping has no explicit converter and the declared source
//! and destination types differ. Objects and lists are handled by the engine
//! (nested type maps, element-wise mapping); this store only covers scalars.

use anyhow::{Context, anyhow, bail};
use serde_json::{Number, Value};

use crate::descriptor::ValueType;

/// Conversion between two value types
pub trait ScalarConverter: Send + Sync {
    fn supports(&self, source: &ValueType, destination: &ValueType) -> bool;

    fn convert(&self, value: &Value, destination: &ValueType) -> anyhow::Result<Value>;
}

/// Ordered set of scalar converters; the first supporting converter wins
pub struct ConverterStore {
    converters: Vec<Box<dyn ScalarConverter>>,
}

impl Default for ConverterStore {
    fn default() -> Self {
        Self {
            converters: vec![
                Box::new(AssignableConverter),
                Box::new(NumberConverter),
                Box::new(BooleanConverter),
                Box::new(StringConverter),
            ],
        }
    }
}

impl ConverterStore {
    /// Store with the built-in converters
    pub fn new() -> Self {
        Self::default()
    }

    /// Store without any converter; only identical types are assignable
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Add a converter ahead of the existing ones
    pub fn with_converter(mut self, converter: impl ScalarConverter + 'static) -> Self {
        self.converters.insert(0, Box::new(converter));
        self
    }

    pub fn supports(&self, source: &ValueType, destination: &ValueType) -> bool {
        source == destination || self.find(source, destination).is_some()
    }

    fn find(&self, source: &ValueType, destination: &ValueType) -> Option<&dyn ScalarConverter> {
        self.converters
            .iter()
            .find(|c| c.supports(source, destination))
            .map(|c| c.as_ref())
    }

    /// Convert `value` declared as `source` into `destination`
    pub fn convert(
        &self,
        value: &Value,
        source: &ValueType,
        destination: &ValueType,
    ) -> anyhow::Result<Value> {
        if value.is_null() || source == destination {
            return Ok(value.clone());
        }
        let converter = self
            .find(source, destination)
            .ok_or_else(|| anyhow!("no converter from {} to {}", source, destination))?;
        converter
            .convert(value, destination)
            .with_context(|| format!("converting {} to {}", source, destination))
    }
}

/// Identical types, or `any` on either side
struct AssignableConverter;

impl ScalarConverter for AssignableConverter {
    fn supports(&self, source: &ValueType, destination: &ValueType) -> bool {
        source == destination
            || matches!(source, ValueType::Any)
            || matches!(destination, ValueType::Any)
    }

    fn convert(&self, value: &Value, _destination: &ValueType) -> anyhow::Result<Value> {
        Ok(value.clone())
    }
}

struct NumberConverter;

impl ScalarConverter for NumberConverter {
    fn supports(&self, source: &ValueType, destination: &ValueType) -> bool {
        matches!(destination, ValueType::Integer | ValueType::Float)
            && matches!(
                source,
                ValueType::Integer | ValueType::Float | ValueType::String | ValueType::Bool
            )
    }

    fn convert(&self, value: &Value, destination: &ValueType) -> anyhow::Result<Value> {
        let number = match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("invalid number {}", n))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .with_context(|| format!("'{}' is not a number", s))?,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => bail!("cannot convert {} to a number", other),
        };

        match destination {
            ValueType::Integer => {
                if let Value::Number(n) = value {
                    if let Some(i) = n.as_i64() {
                        return Ok(Value::from(i));
                    }
                }
                if number.fract() != 0.0 || !number.is_finite() {
                    bail!("{} cannot be represented as an integer", number);
                }
                if number < i64::MIN as f64 || number > i64::MAX as f64 {
                    bail!("{} is out of integer range", number);
                }
                Ok(Value::from(number as i64))
            }
            _ => Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| anyhow!("{} is not a finite number", number)),
        }
    }
}

struct BooleanConverter;

impl ScalarConverter for BooleanConverter {
    fn supports(&self, source: &ValueType, destination: &ValueType) -> bool {
        matches!(destination, ValueType::Bool)
            && matches!(source, ValueType::String | ValueType::Integer)
    }

    fn convert(&self, value: &Value, _destination: &ValueType) -> anyhow::Result<Value> {
        match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
                _ => bail!("'{}' is not a boolean", s),
            },
            other => bail!("cannot convert {} to a boolean", other),
        }
    }
}

struct StringConverter;

impl ScalarConverter for StringConverter {
    fn supports(&self, source: &ValueType, destination: &ValueType) -> bool {
        matches!(destination, ValueType::String) && source.is_scalar()
    }

    fn convert(&self, value: &Value, _destination: &ValueType) -> anyhow::Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            other => bail!("cannot convert {} to a string", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(value: Value, source: ValueType, destination: ValueType) -> anyhow::Result<Value> {
        ConverterStore::new().convert(&value, &source, &destination)
    }

    #[test]
    fn test_supports() {
        let store = ConverterStore::new();
        assert!(store.supports(&ValueType::Integer, &ValueType::Float));
        assert!(store.supports(&ValueType::Integer, &ValueType::String));
        assert!(store.supports(&ValueType::String, &ValueType::Bool));
        assert!(store.supports(&ValueType::Any, &ValueType::object("X")));
        assert!(!store.supports(&ValueType::Bool, &ValueType::list(ValueType::Bool)));
        assert!(!store.supports(&ValueType::object("A"), &ValueType::String));
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(
            convert(json!(3), ValueType::Integer, ValueType::Float).unwrap(),
            json!(3.0)
        );
        assert_eq!(
            convert(json!(4.0), ValueType::Float, ValueType::Integer).unwrap(),
            json!(4)
        );
        assert_eq!(
            convert(json!(" 42 "), ValueType::String, ValueType::Integer).unwrap(),
            json!(42)
        );
        assert!(convert(json!(4.5), ValueType::Float, ValueType::Integer).is_err());
        assert!(convert(json!("abc"), ValueType::String, ValueType::Float).is_err());
    }

    #[test]
    fn test_boolean_and_string_conversions() {
        assert_eq!(
            convert(json!("Yes"), ValueType::String, ValueType::Bool).unwrap(),
            json!(true)
        );
        assert_eq!(
            convert(json!(0), ValueType::Integer, ValueType::Bool).unwrap(),
            json!(false)
        );
        assert_eq!(
            convert(json!(12), ValueType::Integer, ValueType::String).unwrap(),
            json!("12")
        );
        assert_eq!(
            convert(json!(true), ValueType::Bool, ValueType::String).unwrap(),
            json!("true")
        );
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(
            convert(Value::Null, ValueType::String, ValueType::Integer).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_custom_converter_takes_precedence() {
        struct Shouting;

        impl ScalarConverter for Shouting {
            fn supports(&self, _source: &ValueType, destination: &ValueType) -> bool {
                matches!(destination, ValueType::String)
            }

            fn convert(&self, value: &Value, _destination: &ValueType) -> anyhow::Result<Value> {
                Ok(json!(value.to_string().to_uppercase()))
            }
        }

        let store = ConverterStore::new().with_converter(Shouting);
        assert_eq!(
            store
                .convert(&json!(true), &ValueType::Bool, &ValueType::String)
                .unwrap(),
            json!("TRUE")
        );
        assert!(!ConverterStore::empty().supports(&ValueType::Bool, &ValueType::String));
    }
}
