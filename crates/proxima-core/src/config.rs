//! Runtime configuration.
//!
//! Configuration is read from `proxima.toml`, environment variables and
//! built-in defaults.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`PROXIMA_<SECTION>__<KEY>`, for example
//!    `PROXIMA_BUILD__THREADS=4`)
//! 2. Configuration file (`proxima.toml`)
//! 3. Default values
//!
//! Index properties (dimension, metric, edge sizes) are not configuration:
//! they are fixed at creation and persisted with the index.

use crate::search::SearchParams;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse or serialize configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Graph construction section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Worker threads for the search phase of a build (0 = one per core).
    pub threads: usize,
    /// Pending objects linked per `build_pending` call when the caller
    /// passes no explicit pool size (0 = all).
    pub default_pool_size: usize,
    /// Objects searched in parallel before they are linked.
    pub batch_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            default_pool_size: 0,
            batch_size: 200,
        }
    }
}

/// Search defaults section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result count used by [`Index::search_default`](crate::Index::search_default).
    pub default_size: usize,
    /// Exploration slack used when a query does not set one.
    pub default_epsilon: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_size: 10,
            default_epsilon: 0.1,
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximaConfig {
    /// Graph construction.
    pub build: BuildConfig,
    /// Search defaults.
    pub search: SearchConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl ProximaConfig {
    /// Loads configuration from `proxima.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("proxima.toml")
    }

    /// Loads configuration from a specific file path. A missing file is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PROXIMA_").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.threads > 1024 {
            return Err(ConfigError::InvalidValue {
                key: "build.threads".to_string(),
                message: format!("value {} is out of range [0, 1024]", self.build.threads),
            });
        }

        if self.build.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "build.batch_size".to_string(),
                message: "value must be >= 1".to_string(),
            });
        }

        if self.search.default_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.default_size".to_string(),
                message: "value must be >= 1".to_string(),
            });
        }

        let epsilon = self.search.default_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "search.default_epsilon".to_string(),
                message: format!("value {epsilon} must be a finite number >= 0"),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    /// Search parameters built from the `search` section.
    #[must_use]
    pub fn search_params(&self) -> SearchParams {
        SearchParams::new(self.search.default_size).with_epsilon(self.search.default_epsilon)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
