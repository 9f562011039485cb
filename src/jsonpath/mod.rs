//! JSONPath query compiler and evaluator.
//!
//! This is the query engine behind the `find` filter and the JSONPath `for`
//! tag. Queries are compiled once by a [`JsonPathEnvironment`] and evaluated
//! against `serde_json` values.
//!
//! # Supported Syntax
//!
//! - `$` - Root node
//! - `.property` / `['property']` - Named property access
//! - `[index]` - Array index (supports negative indices)
//! - `[*]` or `.*` - All children (wildcard)
//! - `..property`, `..*`, `..[selector]` - Recursive descent
//! - `[start:end:step]` - Array slicing
//! - `['a','b']`, `[1,2]` - Unions
//! - `[?expr]` - Filters, where `@` is the current node, `$` the root and
//!   `_` the extra filter context supplied by the caller
//!
//! # Examples
//!
//! ```
//! use liquid_jsonpath::jsonpath::JsonPathEnvironment;
//! use serde_json::json;
//!
//! let env = JsonPathEnvironment::new();
//! let query = env.compile("$.users[?@.name in _.names].name").unwrap();
//! let data = json!({"users": [{"name": "Sue"}, {"name": "John"}]});
//! let matches = query.evaluate(&data, &json!({"names": ["Sue"]})).unwrap();
//! assert_eq!(matches, vec![json!("Sue")]);
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

use std::sync::Arc;

use serde_json::Value as Json;

pub use ast::{JsonPath, PathSegment};
pub use error::JsonPathError;
pub use evaluator::Evaluator;
pub use functions::{FunctionRegistry, FunctionValue, Operand};
pub use parser::Parser;

/// Compiles query strings using a fixed set of function extensions.
///
/// Cloning is cheap; the function table is shared.
#[derive(Debug, Clone)]
pub struct JsonPathEnvironment {
    functions: Arc<FunctionRegistry>,
}

impl Default for JsonPathEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonPathEnvironment {
    /// An environment with the standard function extensions.
    pub fn new() -> Self {
        Self::with_functions(FunctionRegistry::standard())
    }

    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self {
            functions: Arc::new(functions),
        }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Parses `path`, failing with a syntax error if it is malformed or calls
    /// an unknown function.
    pub fn compile(&self, path: &str) -> Result<CompiledQuery, JsonPathError> {
        log::trace!("compiling JSONPath {:?}", path);
        let parsed = Parser::parse(path, &self.functions)?;
        Ok(CompiledQuery {
            source: path.to_string(),
            path: parsed,
            functions: Arc::clone(&self.functions),
        })
    }
}

/// A parsed query bound to the functions it was compiled against.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    source: String,
    path: JsonPath,
    functions: Arc<FunctionRegistry>,
}

impl CompiledQuery {
    /// The query text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    /// Returns clones of every node matched in `value`, in match order.
    ///
    /// `extra` is exposed to filter expressions as `_`.
    pub fn evaluate(&self, value: &Json, extra: &Json) -> Result<Vec<Json>, JsonPathError> {
        let evaluator = Evaluator::new(value, extra, &self.functions);
        let nodes = evaluator.evaluate(&self.path)?;
        log::trace!("JSONPath {:?} matched {} node(s)", self.source, nodes.len());
        Ok(nodes.into_iter().cloned().collect())
    }
}
