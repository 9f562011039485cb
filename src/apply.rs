//! Applying a JSONPath query to a template value.
//!
//! [`apply`] is the one place that decides what a failed query means. It
//! classifies each failure as a [`FailureKind`] and resolves it with the
//! caller's [`DefaultPolicy`]. It does no I/O and keeps no state, so the
//! filter and the tag call it the same way from synchronous and asynchronous
//! renders.

use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;

use crate::jsonpath::{CompiledQuery, JsonPathEnvironment, JsonPathError};
use crate::policy::DefaultPolicy;
use crate::template::{Undefined, Value};

/// Why a query could not produce matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The value is a scalar or undefined, not an array or object.
    WrongInputType,
    /// The path failed to compile.
    InvalidPathSyntax,
    /// The path compiled but failed while being evaluated.
    EvaluationError,
}

/// A classified failure, returned under [`DefaultPolicy::Raise`].
#[derive(Debug, Clone, Error)]
#[error("{description}")]
pub struct ApplyError {
    kind: FailureKind,
    path: String,
    description: String,
    #[source]
    source: Option<JsonPathError>,
}

impl ApplyError {
    fn wrong_input_type(path: &str, value: &Value) -> Self {
        Self {
            kind: FailureKind::WrongInputType,
            path: path.to_string(),
            description: format!(
                "expected an array or object to apply '{}' to, found {}",
                path,
                describe(value)
            ),
            source: None,
        }
    }

    fn invalid_path(path: &str, err: JsonPathError) -> Self {
        Self {
            kind: FailureKind::InvalidPathSyntax,
            path: path.to_string(),
            description: format!("invalid JSONPath '{}': {}", path, err),
            source: Some(err),
        }
    }

    fn evaluation(path: &str, err: JsonPathError) -> Self {
        Self {
            kind: FailureKind::EvaluationError,
            path: path.to_string(),
            description: format!("error evaluating JSONPath '{}': {}", path, err),
            source: Some(err),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The offending path text.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The outcome of a query under a non-raising policy, or of a successful one.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Matched values in match order, possibly none.
    Matches(Vec<Json>),
    /// A failure resolved under [`DefaultPolicy::Undefined`].
    Undefined(Undefined),
}

impl From<Applied> for Value {
    fn from(applied: Applied) -> Self {
        match applied {
            Applied::Matches(matches) => Value::Defined(Json::Array(matches)),
            Applied::Undefined(undefined) => Value::Undefined(undefined),
        }
    }
}

/// Failure policy and query environment for one filter or tag instance.
#[derive(Debug, Clone, Default)]
pub struct ApplyConfig {
    pub default: DefaultPolicy,
    pub environment: Arc<JsonPathEnvironment>,
}

impl ApplyConfig {
    pub fn new(default: DefaultPolicy) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    /// Swaps in a query environment, e.g. one with extra function extensions.
    pub fn with_environment(mut self, environment: JsonPathEnvironment) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn apply(&self, value: &Value, path: &str, extra: &Json) -> Result<Applied, ApplyError> {
        apply(&self.environment, value, path, extra, self.default)
    }
}

/// Compiles `path` and applies it to `value`.
///
/// `extra` is visible to filter expressions as `_`. The type check comes
/// first, so a scalar `value` never causes `path` to be compiled.
pub fn apply(
    environment: &JsonPathEnvironment,
    value: &Value,
    path: &str,
    extra: &Json,
    policy: DefaultPolicy,
) -> Result<Applied, ApplyError> {
    let result = traversable(value, path).and_then(|data| {
        let query = environment
            .compile(path)
            .map_err(|err| ApplyError::invalid_path(path, err))?;
        evaluate(&query, data, extra)
    });
    resolve(result, policy)
}

/// Applies an already compiled query to `value`.
pub fn apply_compiled(
    query: &CompiledQuery,
    value: &Value,
    extra: &Json,
    policy: DefaultPolicy,
) -> Result<Applied, ApplyError> {
    let result = traversable(value, query.source()).and_then(|data| evaluate(query, data, extra));
    resolve(result, policy)
}

fn traversable<'v>(value: &'v Value, path: &str) -> Result<&'v Json, ApplyError> {
    match value {
        Value::Defined(data @ (Json::Array(_) | Json::Object(_))) => Ok(data),
        _ => Err(ApplyError::wrong_input_type(path, value)),
    }
}

fn evaluate(query: &CompiledQuery, data: &Json, extra: &Json) -> Result<Vec<Json>, ApplyError> {
    query
        .evaluate(data, extra)
        .map_err(|err| ApplyError::evaluation(query.source(), err))
}

fn resolve(
    result: Result<Vec<Json>, ApplyError>,
    policy: DefaultPolicy,
) -> Result<Applied, ApplyError> {
    let err = match result {
        Ok(matches) => return Ok(Applied::Matches(matches)),
        Err(err) => err,
    };

    log::debug!("{:?}: {} (policy: {})", err.kind(), err, policy);
    match policy {
        DefaultPolicy::Raise => Err(err),
        DefaultPolicy::Undefined => Ok(Applied::Undefined(Undefined::new(err.to_string()))),
        DefaultPolicy::Empty => Ok(Applied::Matches(Vec::new())),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Undefined(_) => "an undefined value",
        Value::Defined(Json::Null) => "nil",
        Value::Defined(Json::Bool(_)) => "a boolean",
        Value::Defined(Json::Number(_)) => "a number",
        Value::Defined(Json::String(_)) => "a string",
        Value::Defined(Json::Array(_)) => "an array",
        Value::Defined(Json::Object(_)) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonpath::{FunctionRegistry, FunctionValue};
    use serde_json::json;
    use std::error::Error;

    const POLICIES: [DefaultPolicy; 3] = [
        DefaultPolicy::Raise,
        DefaultPolicy::Undefined,
        DefaultPolicy::Empty,
    ];

    fn users() -> Value {
        Value::from(json!({"users": [{"name": "Sue"}, {"name": "John"}]}))
    }

    fn failing_environment() -> JsonPathEnvironment {
        let mut functions = FunctionRegistry::standard();
        functions.register("mock", |_| -> Result<FunctionValue, JsonPathError> {
            Err(JsonPathError::type_error(":("))
        });
        JsonPathEnvironment::with_functions(functions)
    }

    #[test]
    fn test_apply_matches() {
        let env = JsonPathEnvironment::new();
        let applied = apply(&env, &users(), "$.users.*.name", &json!({}), DefaultPolicy::Empty);
        assert_eq!(
            applied.unwrap(),
            Applied::Matches(vec![json!("Sue"), json!("John")])
        );
    }

    #[test]
    fn test_empty_success_is_not_undefined() {
        let env = JsonPathEnvironment::new();
        for policy in POLICIES {
            let applied = apply(&env, &users(), "$.nobody", &json!({}), policy).unwrap();
            assert_eq!(applied, Applied::Matches(vec![]));
        }
    }

    #[test]
    fn test_scalar_input_follows_policy() {
        let env = JsonPathEnvironment::new();
        for value in [json!("foo"), json!(1), json!(true), json!(null)] {
            let value = Value::from(value);
            let err = apply(&env, &value, "$.a", &json!({}), DefaultPolicy::Raise).unwrap_err();
            assert_eq!(err.kind(), FailureKind::WrongInputType);
            assert_eq!(err.path(), "$.a");
            assert!(err.source().is_none());

            let applied = apply(&env, &value, "$.a", &json!({}), DefaultPolicy::Undefined).unwrap();
            assert!(matches!(applied, Applied::Undefined(u) if u.hint().contains("$.a")));

            let applied = apply(&env, &value, "$.a", &json!({}), DefaultPolicy::Empty).unwrap();
            assert_eq!(applied, Applied::Matches(vec![]));
        }
    }

    #[test]
    fn test_type_check_happens_before_compilation() {
        let env = JsonPathEnvironment::new();
        let err = apply(&env, &Value::from(json!("foo")), "$[1,2", &json!({}), DefaultPolicy::Raise)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::WrongInputType);
    }

    #[test]
    fn test_undefined_input_is_wrong_type() {
        let env = JsonPathEnvironment::new();
        let err = apply(&env, &Value::undefined("x"), "$", &json!({}), DefaultPolicy::Raise)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::WrongInputType);
    }

    #[test]
    fn test_invalid_path_follows_policy() {
        let env = JsonPathEnvironment::new();
        let err = apply(&env, &users(), ".@", &json!({}), DefaultPolicy::Raise).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidPathSyntax);
        assert!(err.to_string().contains(".@"));
        assert!(err.source().is_some());

        let applied = apply(&env, &users(), ".@", &json!({}), DefaultPolicy::Undefined).unwrap();
        assert!(matches!(applied, Applied::Undefined(_)));
        let applied = apply(&env, &users(), ".@", &json!({}), DefaultPolicy::Empty).unwrap();
        assert_eq!(applied, Applied::Matches(vec![]));
    }

    #[test]
    fn test_evaluation_error_follows_policy() {
        let config = ApplyConfig::new(DefaultPolicy::Raise).with_environment(failing_environment());
        let err = config
            .apply(&users(), "$.users[?mock(@)]", &json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::EvaluationError);
        assert!(err.to_string().contains(":("));

        let config = ApplyConfig {
            default: DefaultPolicy::Empty,
            ..config
        };
        assert_eq!(
            config.apply(&users(), "$.users[?mock(@)]", &json!({})).unwrap(),
            Applied::Matches(vec![])
        );
    }

    #[test]
    fn test_extra_context_reaches_filters() {
        let data = Value::from(json!({"users": [{"name": "Sue"}, {"name": "Sally"}, {"name": "Jo"}]}));
        let config = ApplyConfig::default();
        let applied = config
            .apply(
                &data,
                "$.users[?@.name in _.names].name",
                &json!({"names": ["Sue", "Sally"]}),
            )
            .unwrap();
        assert_eq!(applied, Applied::Matches(vec![json!("Sue"), json!("Sally")]));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let env = JsonPathEnvironment::new();
        let query = env.compile("$..name").unwrap();
        let first = apply_compiled(&query, &users(), &json!({}), DefaultPolicy::Raise).unwrap();
        let second = apply_compiled(&query, &users(), &json!({}), DefaultPolicy::Raise).unwrap();
        assert_eq!(first, second);
    }
}
