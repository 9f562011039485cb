//! Runtime values seen by templates.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::error::TemplateError;

/// Marker for a value that does not exist.
///
/// The hint is reported if something later demands a concrete value from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undefined {
    hint: String,
}

impl Undefined {
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }
}

/// How the engine treats undefined values when they are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedMode {
    /// Undefined renders as nothing and iterates as an empty sequence.
    #[default]
    Lenient,
    /// Outputting, iterating or filtering an undefined value is an error.
    Strict,
}

impl UndefinedMode {
    /// Fails when `value` is undefined and the mode is strict.
    pub fn check(self, value: &Value) -> Result<(), TemplateError> {
        match (self, value) {
            (UndefinedMode::Strict, Value::Undefined(undefined)) => {
                Err(TemplateError::Undefined(undefined.hint().to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// A value produced while rendering: either real data or the undefined marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Defined(Json),
    Undefined(Undefined),
}

impl From<Json> for Value {
    fn from(value: Json) -> Self {
        Value::Defined(value)
    }
}

impl Value {
    pub fn undefined(hint: impl Into<String>) -> Self {
        Value::Undefined(Undefined::new(hint))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Defined(json) => Some(json),
            Value::Undefined(_) => None,
        }
    }

    /// Liquid truthiness: everything except nil, false and undefined.
    pub fn is_truthy(&self) -> bool {
        !matches!(
            self,
            Value::Undefined(_) | Value::Defined(Json::Null) | Value::Defined(Json::Bool(false))
        )
    }

    /// Renders the value as template output.
    pub fn to_output(&self, mode: UndefinedMode) -> Result<String, TemplateError> {
        mode.check(self)?;
        Ok(match self {
            Value::Defined(json) => render_json(json),
            Value::Undefined(_) => String::new(),
        })
    }
}

/// Liquid's string form of a JSON value.
pub fn render_json(json: &Json) -> String {
    match json {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::Array(items) => items.iter().map(render_json).collect(),
        Json::Object(_) => json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_json_forms() {
        assert_eq!(render_json(&json!(null)), "");
        assert_eq!(render_json(&json!("hi")), "hi");
        assert_eq!(render_json(&json!(1.5)), "1.5");
        assert_eq!(render_json(&json!(["a", 1, true])), "a1true");
    }

    #[test]
    fn test_undefined_output_depends_on_mode() {
        let value = Value::undefined("'x' is undefined");
        assert_eq!(value.to_output(UndefinedMode::Lenient).unwrap(), "");
        let err = value.to_output(UndefinedMode::Strict).unwrap_err();
        assert!(matches!(err, TemplateError::Undefined(hint) if hint == "'x' is undefined"));
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from(json!(0)).is_truthy());
        assert!(Value::from(json!("")).is_truthy());
        assert!(!Value::from(json!(false)).is_truthy());
        assert!(!Value::undefined("").is_truthy());
    }
}
