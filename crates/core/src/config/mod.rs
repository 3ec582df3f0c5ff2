//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FLIPCAST_*)
//! 2. TOML config file (if FLIPCAST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::AddressScheme;

mod validation;

pub use validation::ConfigError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "FLIPCAST_CONFIG_FILE";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FLIPCAST_*)
/// 2. TOML config file (if FLIPCAST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite message cache.
    ///
    /// Set via FLIPCAST_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Authority of the `content://` addresses the cache answers to.
    ///
    /// Set via FLIPCAST_AUTHORITY environment variable.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Buffered change notifications per subscriber before it lags.
    ///
    /// Set via FLIPCAST_NOTIFY_CAPACITY environment variable.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,

    /// How long a writer waits on a locked database, in milliseconds.
    ///
    /// Set via FLIPCAST_BUSY_TIMEOUT_MS environment variable.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./flipcast.sqlite")
}

fn default_authority() -> String {
    "com.flipkart.flipcast".into()
}

fn default_notify_capacity() -> usize {
    64
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            authority: default_authority(),
            notify_capacity: default_notify_capacity(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Busy timeout as Duration for the SQLite connection.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Address scheme for the configured authority.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the authority is not a valid host.
    pub fn address_scheme(&self) -> Result<AddressScheme, ConfigError> {
        AddressScheme::new(self.authority.clone())
            .map_err(|e| ConfigError::Invalid { field: "authority".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FLIPCAST_`
    /// 2. TOML file from `FLIPCAST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The named configuration file does not exist or cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::var(CONFIG_FILE_ENV).ok().as_deref().map(Path::new))
    }

    /// Like [`AppConfig::load`], with the config file given explicitly.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(ConfigError::Missing {
                    field: "config_file".into(),
                    hint: format!("{} does not exist; unset {CONFIG_FILE_ENV} to use defaults", path.display()),
                });
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("FLIPCAST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
