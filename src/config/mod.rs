//! Configuration for liquid-jsonpath.
//!
//! Settings are read from a TOML file and can be overridden on the command
//! line. Every field has a default, so an empty or partial file is valid.
//!
//! # Example
//!
//! ```
//! use liquid_jsonpath::config::Config;
//! use liquid_jsonpath::policy::DefaultPolicy;
//!
//! let config = Config::default();
//! assert_eq!(config.default_policy, DefaultPolicy::Undefined);
//! assert!(!config.strict_undefined);
//!
//! let config: Config = toml::from_str("default_policy = \"raise\"").unwrap();
//! assert_eq!(config.default_policy, DefaultPolicy::Raise);
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::apply::ApplyConfig;
use crate::policy::DefaultPolicy;
use crate::template::{Environment, UndefinedMode};

/// Configuration for the `find` filter, the `for` tag and the template engine.
///
/// # Fields
///
/// * `default_policy` - What a failed query yields: "raise", "undefined" or "empty" (default: "undefined")
/// * `strict_undefined` - Rendering an undefined value is an error (default: false)
/// * `globals` - Values every template can see, also visible to queries as `_`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_policy: DefaultPolicy,

    #[serde(default)]
    pub strict_undefined: bool,

    /// Template globals
    #[serde(default)]
    pub globals: Map<String, Json>,
}

impl Config {
    /// Returns the path to the config file.
    ///
    /// Uses `~/.config/liquid-jsonpath/config.toml` on all platforms.
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|mut path| {
            path.push(".config");
            path.push("liquid-jsonpath");
            path.push("config.toml");
            path
        })
    }

    /// Loads configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist or can't be read.
    pub fn load() -> Self {
        let config_path = match Self::config_path() {
            Some(path) => path,
            None => return Self::default(),
        };

        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring {}: {:#}", config_path.display(), err);
                Self::default()
            }
        }
    }

    /// Loads configuration from `path`, reporting unreadable or invalid files.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to the default config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&config_path)
    }

    /// Saves configuration to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Policy for both the filter and the tag, using the standard JSONPath functions.
    pub fn apply_config(&self) -> ApplyConfig {
        ApplyConfig::new(self.default_policy)
    }

    pub fn undefined_mode(&self) -> UndefinedMode {
        if self.strict_undefined {
            UndefinedMode::Strict
        } else {
            UndefinedMode::Lenient
        }
    }

    /// An environment with `find` and the JSONPath `for` tag registered.
    pub fn environment(&self) -> Environment {
        crate::environment_builder(self.apply_config())
            .undefined(self.undefined_mode())
            .globals(self.globals.clone())
            .build()
    }
}
