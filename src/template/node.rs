//! Renderable pieces of a parsed template.

use std::fmt;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::context::RenderContext;
use super::error::TemplateError;
use super::expr::FilteredExpression;

/// A parsed piece of template that writes to the output.
///
/// `render_async` must produce exactly what `render` produces; the default
/// implementation simply runs `render` inside a future.
pub trait Node: fmt::Debug + Send + Sync {
    fn render(&self, ctx: &mut RenderContext, out: &mut String) -> Result<(), TemplateError>;

    fn render_async<'a>(
        &'a self,
        ctx: &'a mut RenderContext,
        out: &'a mut String,
    ) -> BoxFuture<'a, Result<(), TemplateError>> {
        async move { self.render(ctx, out) }.boxed()
    }
}

/// Renders `nodes` in order.
pub fn render_nodes(
    nodes: &[Box<dyn Node>],
    ctx: &mut RenderContext,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        node.render(ctx, out)?;
    }
    Ok(())
}

/// Renders `nodes` in order, awaiting each one.
pub async fn render_nodes_async(
    nodes: &[Box<dyn Node>],
    ctx: &mut RenderContext,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        node.render_async(ctx, out).await?;
    }
    Ok(())
}

/// Literal template text.
#[derive(Debug)]
pub struct TextNode(pub String);

impl Node for TextNode {
    fn render(&self, _: &mut RenderContext, out: &mut String) -> Result<(), TemplateError> {
        out.push_str(&self.0);
        Ok(())
    }
}

/// `{{ expression | filter }}`
#[derive(Debug)]
pub struct OutputNode(pub FilteredExpression);

impl Node for OutputNode {
    fn render(&self, ctx: &mut RenderContext, out: &mut String) -> Result<(), TemplateError> {
        let value = self.0.evaluate(ctx)?;
        out.push_str(&value.to_output(ctx.environment().undefined_mode())?);
        Ok(())
    }
}
