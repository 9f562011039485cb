//! Error types raised while parsing or rendering templates.

use thiserror::Error;

/// Boxed underlying cause attached to a template error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the template engine and by the filters and tags plugged into it.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template markup, raised when a template is parsed.
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// A filter was given a value or argument it cannot work with.
    #[error("{filter}: {message}")]
    FilterArgument {
        filter: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// A value had the wrong type for the operation applied to it.
    #[error("type error: {message}")]
    Type {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Strict mode met an undefined value.
    #[error("{0}")]
    Undefined(String),
    /// The template calls a filter the environment does not have.
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
}

impl TemplateError {
    pub fn syntax(message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            source: None,
        }
    }

    pub fn filter_argument(filter: &str, message: impl Into<String>) -> Self {
        TemplateError::FilterArgument {
            filter: filter.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Appends the template line a syntax error was found on.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            TemplateError::Syntax { message, source } => TemplateError::Syntax {
                message: format!("{} on line {}", message, line),
                source,
            },
            other => other,
        }
    }
}
