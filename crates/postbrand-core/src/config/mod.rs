//! Configuration management for postbrand.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.postbrand/config.toml`)
//! 3. Environment variable overrides (`POSTBRAND_` prefix)
//!
//! CLI flag overrides are applied by the binary crates after loading.

mod env_overrides;
pub mod types;
mod validation;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Top-level configuration for the postbrand daemon.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Persistence layer settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Job queue worker pool settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// External social platform client configuration.
    #[serde(default)]
    pub social: SocialConfig,

    /// Chat notification channel configuration.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Content pipeline, review, and publish tunables.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Periodic tick cadence.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// At-rest secrets.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Admin HTTP surface.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Loading sequence:
    /// 1. Determine config file path (argument > `POSTBRAND_CONFIG` env var > default)
    /// 2. Parse TOML file (or use defaults if the default path doesn't exist)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path from arguments, env vars, or default.
    ///
    /// Returns `(path, explicit)` where `explicit` is true if the path was
    /// explicitly provided (via argument or env var) rather than the default.
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(path) = config_path {
            return (expand_tilde(path), true);
        }

        if let Ok(env_path) = env::var("POSTBRAND_CONFIG") {
            return (expand_tilde(&env_path), true);
        }

        (expand_tilde("~/.postbrand/config.toml"), false)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
