//! The `find` filter: `{{ data | find: '$.users.*.name' }}`.

use serde_json::Value as Json;

use crate::apply::{ApplyConfig, ApplyError};
use crate::jsonpath::JsonPathEnvironment;
use crate::policy::DefaultPolicy;
use crate::template::{Filter, RenderContext, TemplateError, Value};

const NAME: &str = "find";

/// Applies a JSONPath query to the filter's left value.
///
/// Render globals are visible to the query as `_`. Failures follow the
/// configured [`DefaultPolicy`]; under [`DefaultPolicy::Raise`] they surface
/// as [`TemplateError::FilterArgument`].
#[derive(Debug, Clone, Default)]
pub struct Find {
    config: ApplyConfig,
}

impl Find {
    /// A filter that yields undefined on failure.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: DefaultPolicy) -> Self {
        Self::with_config(ApplyConfig::new(default))
    }

    pub fn with_config(config: ApplyConfig) -> Self {
        Self { config }
    }

    pub fn default_policy(&self) -> DefaultPolicy {
        self.config.default
    }

    pub fn environment(&self) -> &JsonPathEnvironment {
        &self.config.environment
    }
}

impl Filter for Find {
    fn apply(
        &self,
        left: Value,
        args: &[Value],
        ctx: &RenderContext,
    ) -> Result<Value, TemplateError> {
        let path = match args {
            [Value::Defined(Json::String(path))] => path,
            [_] => {
                return Err(TemplateError::filter_argument(
                    NAME,
                    "expected a JSONPath string argument",
                ))
            }
            _ => {
                return Err(TemplateError::filter_argument(
                    NAME,
                    format!("expected 1 argument, found {}", args.len()),
                ))
            }
        };

        self.config
            .apply(&left, path, ctx.globals())
            .map(Value::from)
            .map_err(argument_error)
    }
}

fn argument_error(err: ApplyError) -> TemplateError {
    TemplateError::FilterArgument {
        filter: NAME.to_string(),
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}
