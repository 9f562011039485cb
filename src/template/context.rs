//! Variable scopes for a single render.

use serde_json::{Map, Value as Json};

use super::Environment;

/// State carried through one render of a template.
///
/// Names resolve through the local scopes (innermost first) and then the
/// globals. Globals never change during a render.
#[derive(Debug)]
pub struct RenderContext {
    env: Environment,
    globals: Json,
    scopes: Vec<Map<String, Json>>,
}

impl RenderContext {
    /// `globals` should be a JSON object; anything else resolves no names.
    pub fn new(env: Environment, globals: Json) -> Self {
        Self {
            env,
            globals,
            scopes: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The merged environment, template and render-time globals.
    pub fn globals(&self) -> &Json {
        &self.globals
    }

    pub fn resolve(&self, name: &str) -> Option<&Json> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Map::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Binds `name` in the innermost scope, opening one if needed.
    pub fn set_local(&mut self, name: impl Into<String>, value: Json) {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locals_shadow_globals() {
        let mut ctx = RenderContext::new(Environment::new(), json!({"x": 1, "y": 2}));
        ctx.push_scope();
        ctx.set_local("x", json!(10));
        assert_eq!(ctx.resolve("x"), Some(&json!(10)));
        assert_eq!(ctx.resolve("y"), Some(&json!(2)));
        ctx.pop_scope();
        assert_eq!(ctx.resolve("x"), Some(&json!(1)));
        assert_eq!(ctx.globals(), &json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_missing_name_is_none() {
        let ctx = RenderContext::new(Environment::new(), json!({}));
        assert_eq!(ctx.resolve("nope"), None);
    }
}
