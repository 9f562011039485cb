//! What the `find` filter and the JSONPath `for` tag do when a path can't be applied.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure policy shared by every failure cause.
///
/// Chosen once, when a filter or tag is constructed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    /// Report the failure as a template error.
    Raise,
    /// Produce the engine's undefined marker.
    #[default]
    Undefined,
    /// Produce an empty sequence.
    Empty,
}

impl fmt::Display for DefaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DefaultPolicy::Raise => "raise",
            DefaultPolicy::Undefined => "undefined",
            DefaultPolicy::Empty => "empty",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown default policy '{0}', expected raise, undefined or empty")]
pub struct ParsePolicyError(String);

impl FromStr for DefaultPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raise" => Ok(DefaultPolicy::Raise),
            "undefined" => Ok(DefaultPolicy::Undefined),
            "empty" => Ok(DefaultPolicy::Empty),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}
