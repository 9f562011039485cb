//! A small Liquid-style template engine.
//!
//! Supports `{{ expression | filter: args }}` output, block tags such as
//! `{% for %}` with `{% else %}`, `-` whitespace control, and both a
//! synchronous and an asynchronous render path. Filters and tags are plugins
//! registered once on an [`EnvironmentBuilder`]; the resulting
//! [`Environment`] is immutable and cheap to clone.
//!
//! ```
//! use liquid_jsonpath::template::Environment;
//! use serde_json::json;
//!
//! let env = Environment::new();
//! let template = env.parse("{% for x in xs %}{{ x | upcase }} {% endfor %}").unwrap();
//! assert_eq!(template.render(&json!({"xs": ["a", "b"]})).unwrap(), "A B ");
//! ```

pub mod context;
pub mod error;
pub mod expr;
pub mod filters;
pub mod node;
pub mod parser;
pub mod tags;
pub mod value;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

pub use context::RenderContext;
pub use error::TemplateError;
pub use expr::{Expression, FilteredExpression, Token, TokenStream};
pub use filters::Filter;
pub use node::Node;
pub use tags::{ForLoop, LoopOptions, StandardForTag, Tag, TagBlock};
pub use value::{Undefined, UndefinedMode, Value};

struct EnvironmentInner {
    filters: IndexMap<String, Arc<dyn Filter>>,
    tags: IndexMap<String, Arc<dyn Tag>>,
    undefined: UndefinedMode,
    globals: Map<String, Json>,
}

/// Registered filters and tags plus engine-wide settings.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("filters", &self.inner.filters.keys().collect::<Vec<_>>())
            .field("tags", &self.inner.tags.keys().collect::<Vec<_>>())
            .field("undefined", &self.inner.undefined)
            .finish()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with the built-in filters and tags and lenient undefined handling.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.inner.filters.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&Arc<dyn Tag>> {
        self.inner.tags.get(name)
    }

    pub fn undefined_mode(&self) -> UndefinedMode {
        self.inner.undefined
    }

    pub fn globals(&self) -> &Map<String, Json> {
        &self.inner.globals
    }

    /// Parses a template. Tag headers are validated here.
    pub fn parse(&self, source: &str) -> Result<Template, TemplateError> {
        self.parse_with_globals(source, Map::new())
    }

    /// Parses a template that carries its own globals, layered over the environment's.
    pub fn parse_with_globals(
        &self,
        source: &str,
        globals: Map<String, Json>,
    ) -> Result<Template, TemplateError> {
        let nodes = parser::parse(self, source)?;
        log::trace!("parsed template into {} node(s)", nodes.len());
        Ok(Template {
            env: self.clone(),
            nodes,
            globals,
        })
    }
}

/// Collects filters, tags and settings for a new [`Environment`].
pub struct EnvironmentBuilder {
    filters: IndexMap<String, Arc<dyn Filter>>,
    tags: IndexMap<String, Arc<dyn Tag>>,
    undefined: UndefinedMode,
    globals: Map<String, Json>,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentBuilder {
    /// Starts from the built-in filters and the standard `for` tag.
    pub fn new() -> Self {
        let mut filters: IndexMap<String, Arc<dyn Filter>> = IndexMap::new();
        for (name, filter) in filters::builtins() {
            filters.insert(name.to_string(), Arc::new(filter));
        }
        let mut tags: IndexMap<String, Arc<dyn Tag>> = IndexMap::new();
        tags.insert("for".to_string(), Arc::new(StandardForTag));

        Self {
            filters,
            tags,
            undefined: UndefinedMode::default(),
            globals: Map::new(),
        }
    }

    /// Registers a filter, replacing any filter of the same name.
    pub fn filter(mut self, name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Registers a block tag, replacing any tag of the same name.
    pub fn tag(mut self, name: impl Into<String>, tag: impl Tag + 'static) -> Self {
        self.tags.insert(name.into(), Arc::new(tag));
        self
    }

    pub fn undefined(mut self, mode: UndefinedMode) -> Self {
        self.undefined = mode;
        self
    }

    pub fn globals(mut self, globals: Map<String, Json>) -> Self {
        self.globals = globals;
        self
    }

    pub fn build(self) -> Environment {
        Environment {
            inner: Arc::new(EnvironmentInner {
                filters: self.filters,
                tags: self.tags,
                undefined: self.undefined,
                globals: self.globals,
            }),
        }
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Debug)]
pub struct Template {
    env: Environment,
    nodes: Vec<Box<dyn Node>>,
    globals: Map<String, Json>,
}

impl Template {
    /// Environment globals, then template globals, then `data` (an object), later wins.
    fn context(&self, data: &Json) -> Result<RenderContext, TemplateError> {
        let mut globals = self.env.globals().clone();
        globals.extend(self.globals.clone());
        match data {
            Json::Object(props) => globals.extend(props.clone()),
            Json::Null => {}
            other => {
                return Err(TemplateError::Type {
                    message: format!("render data must be an object, found {}", other),
                    source: None,
                })
            }
        }
        Ok(RenderContext::new(self.env.clone(), Json::Object(globals)))
    }

    pub fn render(&self, data: &Json) -> Result<String, TemplateError> {
        let mut ctx = self.context(data)?;
        let mut out = String::new();
        node::render_nodes(&self.nodes, &mut ctx, &mut out)?;
        Ok(out)
    }

    /// Renders cooperatively; output is identical to [`Template::render`].
    pub async fn render_async(&self, data: &Json) -> Result<String, TemplateError> {
        let mut ctx = self.context(data)?;
        let mut out = String::new();
        node::render_nodes_async(&self.nodes, &mut ctx, &mut out).await?;
        Ok(out)
    }
}
