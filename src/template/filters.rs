//! The filter plugin interface and the built-in filters.

use serde_json::Value as Json;

use super::context::RenderContext;
use super::error::TemplateError;
use super::value::{render_json, Value};

/// A value transform invoked as `{{ left | name: arg, ... }}`.
///
/// The same instance serves synchronous and asynchronous renders, so
/// implementations must not block or keep per-call state.
pub trait Filter: Send + Sync {
    fn apply(
        &self,
        left: Value,
        args: &[Value],
        ctx: &RenderContext,
    ) -> Result<Value, TemplateError>;

    /// Whether the filter still runs on an undefined left value in strict mode.
    fn accepts_undefined(&self) -> bool {
        false
    }
}

type FilterFn = fn(Value, &[Value], &RenderContext) -> Result<Value, TemplateError>;

/// A filter backed by a plain function.
pub(crate) struct BuiltinFilter {
    function: FilterFn,
    accepts_undefined: bool,
}

impl Filter for BuiltinFilter {
    fn apply(
        &self,
        left: Value,
        args: &[Value],
        ctx: &RenderContext,
    ) -> Result<Value, TemplateError> {
        (self.function)(left, args, ctx)
    }

    fn accepts_undefined(&self) -> bool {
        self.accepts_undefined
    }
}

/// The filters every environment starts with.
pub(crate) fn builtins() -> Vec<(&'static str, BuiltinFilter)> {
    fn plain(function: FilterFn) -> BuiltinFilter {
        BuiltinFilter {
            function,
            accepts_undefined: false,
        }
    }

    vec![
        ("join", plain(join)),
        ("size", plain(size)),
        ("first", plain(first)),
        ("last", plain(last)),
        ("upcase", plain(upcase)),
        ("downcase", plain(downcase)),
        (
            "default",
            BuiltinFilter {
                function: default,
                accepts_undefined: true,
            },
        ),
    ]
}

fn string_arg(filter: &str, args: &[Value], index: usize) -> Result<Option<String>, TemplateError> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::Defined(Json::String(s))) => Ok(Some(s.clone())),
        Some(Value::Defined(other)) => Ok(Some(render_json(other))),
        Some(Value::Undefined(_)) => Err(TemplateError::filter_argument(
            filter,
            format!("argument {} is undefined", index + 1),
        )),
    }
}

fn join(left: Value, args: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    let separator = string_arg("join", args, 0)?.unwrap_or_else(|| " ".to_string());
    let joined = match left {
        Value::Undefined(_) => String::new(),
        Value::Defined(Json::Array(items)) => items
            .iter()
            .map(render_json)
            .collect::<Vec<_>>()
            .join(&separator),
        Value::Defined(other) => render_json(&other),
    };
    Ok(Value::Defined(Json::String(joined)))
}

fn size(left: Value, _: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    let len = match &left {
        Value::Defined(Json::Array(items)) => items.len(),
        Value::Defined(Json::Object(props)) => props.len(),
        Value::Defined(Json::String(s)) => s.chars().count(),
        _ => 0,
    };
    Ok(Value::Defined(Json::from(len)))
}

fn first(left: Value, _: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    Ok(match left {
        Value::Defined(Json::Array(mut items)) if !items.is_empty() => Value::Defined(items.swap_remove(0)),
        _ => Value::Defined(Json::Null),
    })
}

fn last(left: Value, _: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    Ok(match left {
        Value::Defined(Json::Array(mut items)) => Value::Defined(items.pop().unwrap_or(Json::Null)),
        _ => Value::Defined(Json::Null),
    })
}

fn upcase(left: Value, _: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    let text = left.as_json().map(render_json).unwrap_or_default();
    Ok(Value::Defined(Json::String(text.to_uppercase())))
}

fn downcase(left: Value, _: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    let text = left.as_json().map(render_json).unwrap_or_default();
    Ok(Value::Defined(Json::String(text.to_lowercase())))
}

fn default(left: Value, args: &[Value], _: &RenderContext) -> Result<Value, TemplateError> {
    let empty = match &left {
        Value::Undefined(_) | Value::Defined(Json::Null) | Value::Defined(Json::Bool(false)) => true,
        Value::Defined(Json::String(s)) => s.is_empty(),
        Value::Defined(Json::Array(items)) => items.is_empty(),
        Value::Defined(Json::Object(props)) => props.is_empty(),
        Value::Defined(Json::Number(_)) | Value::Defined(Json::Bool(true)) => false,
    };
    if empty {
        Ok(args
            .first()
            .cloned()
            .unwrap_or(Value::Defined(Json::String(String::new()))))
    } else {
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Environment;
    use serde_json::json;

    fn ctx() -> RenderContext {
        RenderContext::new(Environment::new(), json!({}))
    }

    #[test]
    fn test_join_array_with_separator() {
        let out = join(
            Value::from(json!(["a", 1, "b"])),
            &[Value::from(json!("-"))],
            &ctx(),
        )
        .unwrap();
        assert_eq!(out, Value::from(json!("a-1-b")));
    }

    #[test]
    fn test_join_defaults_to_space_and_tolerates_undefined() {
        assert_eq!(
            join(Value::from(json!(["a", "b"])), &[], &ctx()).unwrap(),
            Value::from(json!("a b"))
        );
        assert_eq!(
            join(Value::undefined("x"), &[], &ctx()).unwrap(),
            Value::from(json!(""))
        );
    }

    #[test]
    fn test_first_last_size() {
        let items = Value::from(json!([3, 4, 5]));
        assert_eq!(first(items.clone(), &[], &ctx()).unwrap(), Value::from(json!(3)));
        assert_eq!(last(items.clone(), &[], &ctx()).unwrap(), Value::from(json!(5)));
        assert_eq!(size(items, &[], &ctx()).unwrap(), Value::from(json!(3)));
        assert_eq!(
            first(Value::from(json!([])), &[], &ctx()).unwrap(),
            Value::from(json!(null))
        );
    }

    #[test]
    fn test_default_replaces_empty_values() {
        let fallback = [Value::from(json!("none"))];
        assert_eq!(
            default(Value::undefined("x"), &fallback, &ctx()).unwrap(),
            Value::from(json!("none"))
        );
        assert_eq!(
            default(Value::from(json!([])), &fallback, &ctx()).unwrap(),
            Value::from(json!("none"))
        );
        assert_eq!(
            default(Value::from(json!(0)), &fallback, &ctx()).unwrap(),
            Value::from(json!(0))
        );
        assert_eq!(
            default(Value::from(json!(false)), &fallback, &ctx()).unwrap(),
            Value::from(json!("none"))
        );
        assert_eq!(
            default(Value::from(json!(true)), &fallback, &ctx()).unwrap(),
            Value::from(json!(true))
        );
    }
}
