//! A `for` tag that can loop over JSONPath matches.
//!
//! ```text
//! {% for name in data | '$.users.*.name' limit: 2 %}{{ name }}{% endfor %}
//! ```
//!
//! Without a `| '<path>'` part the tag behaves exactly like the standard
//! `for` tag. Loop modifiers apply to the matches, not to the source value.

use serde_json::Value as Json;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::apply::{apply_compiled, ApplyConfig, ApplyError};
use crate::jsonpath::{CompiledQuery, JsonPathEnvironment};
use crate::policy::DefaultPolicy;
use crate::template::{
    Expression, ForLoop, LoopOptions, Node, RenderContext, Tag, TagBlock, TemplateError, Token,
    TokenStream, Value,
};

/// Replacement for the standard `for` tag, registered under the name `for`.
///
/// A malformed path is a syntax error when the template is parsed, whatever
/// the policy. Failures at render time follow the configured
/// [`DefaultPolicy`]; under [`DefaultPolicy::Raise`] they surface as
/// [`TemplateError::Type`].
#[derive(Debug, Clone, Default)]
pub struct JsonPathForTag {
    config: ApplyConfig,
}

impl JsonPathForTag {
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
}

impl Tag for JsonPathForTag {
    fn parse(&self, header: &str, block: TagBlock) -> Result<Box<dyn Node>, TemplateError> {
        let header = LoopHeader::parse(header, &self.config.environment)?;
        Ok(Box::new(JsonPathForNode {
            source: header.source,
            query: header.query,
            default: self.config.default,
            looper: ForLoop::new(header.variable, header.options, block),
        }))
    }
}

/// `<name> in <source> [| '<path>'] [limit: n] [offset: n] [reversed]`
#[derive(Debug)]
struct LoopHeader {
    variable: String,
    source: Expression,
    query: Option<CompiledQuery>,
    options: LoopOptions,
}

impl LoopHeader {
    fn parse(header: &str, environment: &JsonPathEnvironment) -> Result<Self, TemplateError> {
        let mut stream = TokenStream::new(header)?;
        let variable = stream.expect_identifier()?;
        if !stream.eat_word("in") {
            return Err(TemplateError::syntax(format!(
                "expected 'in' after '{}' in for loop header",
                variable
            )));
        }
        let source = Expression::parse_primary(&mut stream)?;

        let query = if stream.eat(&Token::Pipe) {
            let Some(Token::Str(path)) = stream.next() else {
                return Err(TemplateError::syntax(
                    "expected a quoted JSONPath after '|' in for loop header",
                ));
            };
            let query = environment
                .compile(&path)
                .map_err(|err| TemplateError::Syntax {
                    message: format!("invalid JSONPath '{}': {}", path, err),
                    source: Some(Box::new(err)),
                })?;
            Some(query)
        } else {
            None
        };

        let options = LoopOptions::parse(&mut stream)?;
        Ok(Self {
            variable,
            source,
            query,
            options,
        })
    }
}

/// One parsed loop. Rendering moves through source evaluated, query applied,
/// iterating and done; a failed query either ends the loop early (no matches,
/// lenient undefined) or raises.
#[derive(Debug)]
struct JsonPathForNode {
    source: Expression,
    query: Option<CompiledQuery>,
    default: DefaultPolicy,
    looper: ForLoop,
}

impl JsonPathForNode {
    /// The items to iterate: matches, or the source itself if there is no path.
    fn items(&self, ctx: &RenderContext) -> Result<Vec<Json>, TemplateError> {
        let source = self.source.evaluate(ctx);
        let target = match &self.query {
            None => source,
            Some(query) => apply_compiled(query, &source, ctx.globals(), self.default)
                .map(Value::from)
                .map_err(type_error)?,
        };
        // Undefined goes through untouched so the engine's strictness decides.
        self.looper.items(target, ctx)
    }
}

impl Node for JsonPathForNode {
    fn render(&self, ctx: &mut RenderContext, out: &mut String) -> Result<(), TemplateError> {
        let items = self.items(ctx)?;
        self.looper.render_items(items, ctx, out)
    }

    fn render_async<'a>(
        &'a self,
        ctx: &'a mut RenderContext,
        out: &'a mut String,
    ) -> BoxFuture<'a, Result<(), TemplateError>> {
        async move {
            let items = self.items(ctx)?;
            self.looper.render_items_async(items, ctx, out).await
        }
        .boxed()
    }
}

fn type_error(err: ApplyError) -> TemplateError {
    TemplateError::Type {
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Environment;
    use serde_json::json;

    fn env(tag: JsonPathForTag) -> Environment {
        Environment::builder().tag("for", tag).build()
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(JsonPathForTag::new().default_policy(), DefaultPolicy::Undefined);
        assert_eq!(
            JsonPathForTag::with_default(DefaultPolicy::Raise).default_policy(),
            DefaultPolicy::Raise
        );
    }

    #[test]
    fn test_header_without_pipe() {
        let header = LoopHeader::parse("x in xs limit: 2", &JsonPathEnvironment::new()).unwrap();
        assert_eq!(header.variable, "x");
        assert!(header.query.is_none());
        assert!(header.options.limit.is_some());
    }

    #[test]
    fn test_header_with_path_and_modifiers() {
        let header = LoopHeader::parse(
            "name in data | '$.users.*.name' reversed",
            &JsonPathEnvironment::new(),
        )
        .unwrap();
        assert_eq!(header.query.unwrap().source(), "$.users.*.name");
        assert!(header.options.reversed);
    }

    #[test]
    fn test_header_requires_quoted_path() {
        let err = LoopHeader::parse("x in data | foo", &JsonPathEnvironment::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn test_malformed_path_is_syntax_error_for_every_policy() {
        for policy in [DefaultPolicy::Raise, DefaultPolicy::Undefined, DefaultPolicy::Empty] {
            let err = env(JsonPathForTag::with_default(policy))
                .parse("{% for name in data | '$[1,2' %}{{ name }}, {% endfor %}")
                .unwrap_err();
            let TemplateError::Syntax { message, source } = err else {
                panic!("expected a syntax error");
            };
            assert!(message.contains("$[1,2"));
            assert!(message.contains("line 1"));
            assert!(source.is_some());
        }
    }

    #[test]
    fn test_modifiers_apply_to_matches() {
        let template = env(JsonPathForTag::new())
            .parse("{% for n in data | '$.*' offset: 1 limit: 2 %}{{ n }}{% endfor %}")
            .unwrap();
        let out = template.render(&json!({"data": {"a": 1, "b": 2, "c": 3, "d": 4}})).unwrap();
        assert_eq!(out, "23");
    }

    #[test]
    fn test_else_renders_on_no_matches() {
        let template = env(JsonPathForTag::new())
            .parse("{% for n in data | '$.nothing' %}{{ n }}{% else %}empty{% endfor %}")
            .unwrap();
        assert_eq!(template.render(&json!({"data": {}})).unwrap(), "empty");
    }
}
