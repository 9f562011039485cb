//! Error types for JSONPath parsing and evaluation.

use thiserror::Error;

/// Errors that can occur during JSONPath parsing or evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonPathError {
    /// Unexpected token at a specific position.
    #[error("unexpected token '{found}' at position {position}, expected {expected}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: String,
    },
    /// Unexpected end of input.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },
    /// Invalid syntax with description.
    #[error("invalid JSONPath syntax: {message}")]
    InvalidSyntax { message: String },
    /// A filter calls a function the environment does not know.
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },
    /// A function extension failed while the query was evaluated.
    #[error("{message}")]
    Type { message: String },
}

impl JsonPathError {
    /// Builds an evaluation-time type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        JsonPathError::Type {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while compiling a path.
    pub fn is_syntax_error(&self) -> bool {
        !matches!(self, JsonPathError::Type { .. })
    }
}
