//! Common conditions and combinators

use std::sync::Arc;

use super::{Condition, MappingContext, condition_fn};
use crate::descriptor::ValueType;

/// Applies when the source value is not null
pub fn is_not_null() -> Arc<dyn Condition> {
    condition_fn(|context| Ok(!context.source().is_null()))
}

/// Applies when the source value is null
pub fn is_null() -> Arc<dyn Condition> {
    condition_fn(|context| Ok(context.source().is_null()))
}

/// Applies when the runtime type of the source value is `value_type`
pub fn is_type(value_type: ValueType) -> Arc<dyn Condition> {
    condition_fn(move |context| Ok(ValueType::of_value(context.source()) == value_type))
}

/// Negation of `condition`
pub fn not(condition: Arc<dyn Condition>) -> Arc<dyn Condition> {
    condition_fn(move |context| Ok(!condition.applies(context)?))
}

/// Both conditions apply; `right` is not evaluated when `left` fails
pub fn and(left: Arc<dyn Condition>, right: Arc<dyn Condition>) -> Arc<dyn Condition> {
    condition_fn(move |context: &MappingContext<'_>| {
        Ok(left.applies(context)? && right.applies(context)?)
    })
}

/// Either condition applies; `right` is not evaluated when `left` holds
pub fn or(left: Arc<dyn Condition>, right: Arc<dyn Condition>) -> Arc<dyn Condition> {
    condition_fn(move |context: &MappingContext<'_>| {
        Ok(left.applies(context)? || right.applies(context)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeRegistry;
    use crate::engine::Engine;
    use serde_json::{Value, json};

    fn check(condition: &Arc<dyn Condition>, source: &Value) -> bool {
        let engine = Engine::new(TypeRegistry::new());
        let context = MappingContext::new(&engine, source, None, &ValueType::Any, &ValueType::Any);
        condition.applies(&context).unwrap()
    }

    #[test]
    fn test_null_checks() {
        assert!(check(&is_not_null(), &json!(1)));
        assert!(!check(&is_not_null(), &Value::Null));
        assert!(check(&is_null(), &Value::Null));
    }

    #[test]
    fn test_is_type() {
        assert!(check(&is_type(ValueType::String), &json!("x")));
        assert!(!check(&is_type(ValueType::String), &json!(2)));
    }

    #[test]
    fn test_combinators() {
        let string = is_type(ValueType::String);
        assert!(check(&and(is_not_null(), string.clone()), &json!("x")));
        assert!(!check(&and(is_not_null(), string.clone()), &json!(1)));
        assert!(check(&or(is_null(), string.clone()), &Value::Null));
        assert!(check(&not(string), &json!(1)));
    }

    #[test]
    fn test_errors_propagate() {
        let failing = condition_fn(|_| Err(anyhow::anyhow!("no access")));
        let engine = Engine::new(TypeRegistry::new());
        let source = json!(1);
        let context = MappingContext::new(&engine, &source, None, &ValueType::Any, &ValueType::Any);

        assert!(and(is_not_null(), failing.clone()).applies(&context).is_err());
        // short-circuit: `or` never reaches the failing condition
        assert!(or(is_not_null(), failing).applies(&context).unwrap());
    }
}
