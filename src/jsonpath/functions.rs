//! Function extensions callable from filter expressions.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value as Json;

use super::error::JsonPathError;

/// An argument passed to a function extension.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    /// No value, e.g. a singular path that matched nothing.
    Nothing,
    /// A single JSON value.
    Value(Cow<'a, Json>),
    /// Every node matched by a path argument.
    Nodes(Vec<&'a Json>),
    /// The result of a logical expression.
    Logical(bool),
}

impl<'a> Operand<'a> {
    /// Collapses a node list to the value it holds, if it holds exactly one.
    pub fn as_value(&self) -> Option<&Json> {
        match self {
            Operand::Value(v) => Some(v.as_ref()),
            Operand::Nodes(nodes) if nodes.len() == 1 => Some(nodes[0]),
            _ => None,
        }
    }

    /// Truthiness of the operand when used as a filter test.
    pub fn is_truthy(&self) -> bool {
        match self {
            Operand::Nothing => false,
            Operand::Logical(b) => *b,
            Operand::Nodes(nodes) => !nodes.is_empty(),
            Operand::Value(v) => !matches!(v.as_ref(), Json::Null | Json::Bool(false)),
        }
    }
}

/// The value returned by a function extension.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionValue {
    Nothing,
    Value(Json),
    Logical(bool),
}

impl From<FunctionValue> for Operand<'_> {
    fn from(value: FunctionValue) -> Self {
        match value {
            FunctionValue::Nothing => Operand::Nothing,
            FunctionValue::Value(v) => Operand::Value(Cow::Owned(v)),
            FunctionValue::Logical(b) => Operand::Logical(b),
        }
    }
}

type Function = dyn Fn(&[Operand<'_>]) -> Result<FunctionValue, JsonPathError> + Send + Sync;

/// Named function extensions known to an environment.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<Function>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `length`, `count`, `match`, `search` and `value`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("length", length);
        registry.register("count", count);
        registry.register("match", |args| regex_test(args, true));
        registry.register("search", |args| regex_test(args, false));
        registry.register("value", value);
        registry
    }

    /// Adds or replaces a function.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Operand<'_>]) -> Result<FunctionValue, JsonPathError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Calls a function by name.
    pub fn call(&self, name: &str, args: &[Operand<'_>]) -> Result<FunctionValue, JsonPathError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| JsonPathError::UnknownFunction {
                name: name.to_string(),
            })?;
        function(args)
    }
}

fn expect_args(name: &str, args: &[Operand<'_>], n: usize) -> Result<(), JsonPathError> {
    if args.len() != n {
        return Err(JsonPathError::type_error(format!(
            "{}() takes {} argument(s), {} given",
            name,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn length(args: &[Operand<'_>]) -> Result<FunctionValue, JsonPathError> {
    expect_args("length", args, 1)?;
    let len = match args[0].as_value() {
        Some(Json::String(s)) => s.chars().count(),
        Some(Json::Array(items)) => items.len(),
        Some(Json::Object(props)) => props.len(),
        _ => return Ok(FunctionValue::Nothing),
    };
    Ok(FunctionValue::Value(Json::from(len)))
}

fn count(args: &[Operand<'_>]) -> Result<FunctionValue, JsonPathError> {
    expect_args("count", args, 1)?;
    match &args[0] {
        Operand::Nodes(nodes) => Ok(FunctionValue::Value(Json::from(nodes.len()))),
        _ => Err(JsonPathError::type_error("count() expects a path argument")),
    }
}

fn value(args: &[Operand<'_>]) -> Result<FunctionValue, JsonPathError> {
    expect_args("value", args, 1)?;
    match &args[0] {
        Operand::Nodes(nodes) if nodes.len() == 1 => Ok(FunctionValue::Value(nodes[0].clone())),
        Operand::Nodes(_) => Ok(FunctionValue::Nothing),
        _ => Err(JsonPathError::type_error("value() expects a path argument")),
    }
}

fn regex_test(args: &[Operand<'_>], full: bool) -> Result<FunctionValue, JsonPathError> {
    expect_args(if full { "match" } else { "search" }, args, 2)?;
    let (Some(Json::String(subject)), Some(Json::String(pattern))) =
        (args[0].as_value(), args[1].as_value())
    else {
        return Ok(FunctionValue::Logical(false));
    };
    let pattern = if full {
        format!("^(?:{})$", pattern)
    } else {
        pattern.clone()
    };
    // An invalid pattern matches nothing.
    let matched = Regex::new(&pattern)
        .map(|re| re.is_match(subject))
        .unwrap_or(false);
    Ok(FunctionValue::Logical(matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length_of_string_and_array() {
        let registry = FunctionRegistry::standard();
        let s = json!("héllo");
        let a = json!([1, 2, 3]);
        assert_eq!(
            registry.call("length", &[Operand::Nodes(vec![&s])]).unwrap(),
            FunctionValue::Value(json!(5))
        );
        assert_eq!(
            registry.call("length", &[Operand::Nodes(vec![&a])]).unwrap(),
            FunctionValue::Value(json!(3))
        );
    }

    #[test]
    fn test_match_is_anchored_search_is_not() {
        let registry = FunctionRegistry::standard();
        let subject = Operand::Value(Cow::Owned(json!("foobar")));
        let pattern = Operand::Value(Cow::Owned(json!("foo")));
        let args = [subject, pattern];
        assert_eq!(
            registry.call("match", &args).unwrap(),
            FunctionValue::Logical(false)
        );
        assert_eq!(
            registry.call("search", &args).unwrap(),
            FunctionValue::Logical(true)
        );
    }

    #[test]
    fn test_wrong_arity_is_type_error() {
        let registry = FunctionRegistry::standard();
        let err = registry.call("count", &[]).unwrap_err();
        assert!(!err.is_syntax_error());
    }

    #[test]
    fn test_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry.register("always", |_| Ok(FunctionValue::Logical(true)));
        assert!(registry.contains("always"));
        assert!(!registry.contains("length"));
        assert_eq!(
            registry.call("always", &[]).unwrap(),
            FunctionValue::Logical(true)
        );
    }
}
