//! The tag plugin interface and the standard `for` loop.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value as Json};

use super::context::RenderContext;
use super::error::TemplateError;
use super::expr::{Expression, Token, TokenStream};
use super::node::{render_nodes, render_nodes_async, Node};
use super::value::Value;

/// The nodes between a block tag and its end tag.
#[derive(Debug, Default)]
pub struct TagBlock {
    /// Nodes before `{% else %}`, or all of them.
    pub body: Vec<Box<dyn Node>>,
    /// Nodes after `{% else %}`, if there was one.
    pub alternative: Option<Vec<Box<dyn Node>>>,
}

/// A block tag, `{% name header %}...{% endname %}`.
///
/// `parse` runs once when the template is parsed and gets the raw header
/// text; anything wrong with the header is reported there as a syntax error.
pub trait Tag: Send + Sync {
    fn parse(&self, header: &str, block: TagBlock) -> Result<Box<dyn Node>, TemplateError>;
}

/// `limit`, `offset` and `reversed` loop modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopOptions {
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub reversed: bool,
}

impl LoopOptions {
    /// Parses modifiers until the end of the header.
    pub fn parse(stream: &mut TokenStream) -> Result<Self, TemplateError> {
        let mut options = LoopOptions::default();
        while let Some(token) = stream.next() {
            match token {
                Token::Word(word) if word == "reversed" => options.reversed = true,
                Token::Word(word) if word == "limit" => {
                    stream.expect(&Token::Colon)?;
                    options.limit = Some(Expression::parse_primary(stream)?);
                }
                Token::Word(word) if word == "offset" => {
                    stream.expect(&Token::Colon)?;
                    options.offset = Some(Expression::parse_primary(stream)?);
                }
                Token::Comma => {}
                other => {
                    return Err(TemplateError::syntax(format!(
                        "unexpected {:?} in for loop header",
                        other
                    )))
                }
            }
        }
        Ok(options)
    }

    fn integer(
        name: &str,
        expr: &Option<Expression>,
        ctx: &RenderContext,
    ) -> Result<Option<usize>, TemplateError> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match expr.evaluate(ctx) {
            // Fractions truncate and negatives count as zero.
            Value::Defined(Json::Number(n)) => Ok(Some(match n.as_u64() {
                Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
                None => n.as_f64().map_or(0, |f| f.max(0.0) as usize),
            })),
            Value::Defined(Json::Null) | Value::Undefined(_) => Ok(None),
            Value::Defined(other) => Err(TemplateError::Type {
                message: format!("loop {} must be an integer, found {}", name, other),
                source: None,
            }),
        }
    }

    /// Applies offset, then limit, then reversal.
    fn apply(&self, mut items: Vec<Json>, ctx: &RenderContext) -> Result<Vec<Json>, TemplateError> {
        if let Some(offset) = Self::integer("offset", &self.offset, ctx)? {
            items.drain(..offset.min(items.len()));
        }
        if let Some(limit) = Self::integer("limit", &self.limit, ctx)? {
            items.truncate(limit);
        }
        if self.reversed {
            items.reverse();
        }
        Ok(items)
    }
}

/// Iteration machinery shared by every `for`-like tag.
#[derive(Debug)]
pub struct ForLoop {
    pub variable: String,
    pub options: LoopOptions,
    pub body: Vec<Box<dyn Node>>,
    pub alternative: Vec<Box<dyn Node>>,
}

impl ForLoop {
    pub fn new(variable: String, options: LoopOptions, block: TagBlock) -> Self {
        Self {
            variable,
            options,
            body: block.body,
            alternative: block.alternative.unwrap_or_default(),
        }
    }

    /// Turns the loop target into the items to iterate, modifiers applied.
    ///
    /// Undefined targets fail in strict mode and iterate nothing otherwise.
    /// Objects iterate as `[key, value]` pairs; scalars iterate nothing.
    pub fn items(&self, target: Value, ctx: &RenderContext) -> Result<Vec<Json>, TemplateError> {
        ctx.environment().undefined_mode().check(&target)?;
        let items = match target {
            Value::Defined(Json::Array(items)) => items,
            Value::Defined(Json::Object(props)) => {
                props.into_iter().map(|(k, v)| json!([k, v])).collect()
            }
            _ => Vec::new(),
        };
        self.options.apply(items, ctx)
    }

    fn bind(&self, ctx: &mut RenderContext, item: Json, index: usize, length: usize) {
        ctx.set_local(self.variable.clone(), item);
        ctx.set_local(
            "forloop",
            json!({
                "index": index + 1,
                "index0": index,
                "rindex": length - index,
                "rindex0": length - index - 1,
                "first": index == 0,
                "last": index + 1 == length,
                "length": length,
            }),
        );
    }

    pub fn render_items(
        &self,
        items: Vec<Json>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        if items.is_empty() {
            return render_nodes(&self.alternative, ctx, out);
        }

        let length = items.len();
        ctx.push_scope();
        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            self.bind(ctx, item, index, length);
            result = render_nodes(&self.body, ctx, out);
            if result.is_err() {
                break;
            }
        }
        ctx.pop_scope();
        result
    }

    /// Like `render_items`, yielding to the executor before each iteration.
    pub async fn render_items_async(
        &self,
        items: Vec<Json>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        if items.is_empty() {
            return render_nodes_async(&self.alternative, ctx, out).await;
        }

        let length = items.len();
        ctx.push_scope();
        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            tokio::task::yield_now().await;
            self.bind(ctx, item, index, length);
            result = render_nodes_async(&self.body, ctx, out).await;
            if result.is_err() {
                break;
            }
        }
        ctx.pop_scope();
        result
    }
}

/// The standard `{% for item in collection %}` tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardForTag;

impl Tag for StandardForTag {
    fn parse(&self, header: &str, block: TagBlock) -> Result<Box<dyn Node>, TemplateError> {
        let mut stream = TokenStream::new(header)?;
        let variable = stream.expect_identifier()?;
        if !stream.eat_word("in") {
            return Err(TemplateError::syntax(format!(
                "expected 'in' after '{}' in for loop header",
                variable
            )));
        }
        let target = Expression::parse_primary(&mut stream)?;
        let options = LoopOptions::parse(&mut stream)?;
        Ok(Box::new(ForNode {
            target,
            looper: ForLoop::new(variable, options, block),
        }))
    }
}

#[derive(Debug)]
struct ForNode {
    target: Expression,
    looper: ForLoop,
}

impl Node for ForNode {
    fn render(&self, ctx: &mut RenderContext, out: &mut String) -> Result<(), TemplateError> {
        let items = self.looper.items(self.target.evaluate(ctx), ctx)?;
        self.looper.render_items(items, ctx, out)
    }

    fn render_async<'a>(
        &'a self,
        ctx: &'a mut RenderContext,
        out: &'a mut String,
    ) -> BoxFuture<'a, Result<(), TemplateError>> {
        async move {
            let items = self.looper.items(self.target.evaluate(ctx), ctx)?;
            self.looper.render_items_async(items, ctx, out).await
        }
        .boxed()
    }
}
