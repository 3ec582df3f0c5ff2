//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Largest accepted notification buffer.
pub const MAX_NOTIFY_CAPACITY: usize = 65_536;

/// Longest accepted busy timeout (60 seconds).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `authority` is empty or not a valid URI host
    /// - `notify_capacity` is 0 or exceeds 65536
    /// - `busy_timeout_ms` exceeds 60 seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authority.is_empty() {
            return Err(ConfigError::Invalid { field: "authority".into(), reason: "must not be empty".into() });
        }
        self.address_scheme()?;

        if self.notify_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "notify_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.notify_capacity > MAX_NOTIFY_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "notify_capacity".into(),
                reason: format!("must not exceed {MAX_NOTIFY_CAPACITY}"),
            });
        }

        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: "must not exceed 60 seconds (60000ms)".into(),
            });
        }
        if self.busy_timeout_ms == 0 {
            tracing::warn!("busy_timeout_ms is 0; concurrent writers will fail immediately with SQLITE_BUSY");
        }

        if self.db_path.as_os_str().is_empty() {
            tracing::warn!("db_path is empty; SQLite will use a private temporary database");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_authority() {
        let config = AppConfig { authority: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "authority"));
    }

    #[test]
    fn test_validate_malformed_authority() {
        let config = AppConfig { authority: "not a host".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "authority"));
    }

    #[test]
    fn test_validate_notify_capacity_zero() {
        let config = AppConfig { notify_capacity: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "notify_capacity"));
    }

    #[test]
    fn test_validate_notify_capacity_exceeds_limit() {
        let config = AppConfig { notify_capacity: MAX_NOTIFY_CAPACITY + 1, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "notify_capacity"));
    }

    #[test]
    fn test_validate_busy_timeout_exceeds_limit() {
        let config = AppConfig { busy_timeout_ms: 60_001, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "busy_timeout_ms"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { notify_capacity: 1, busy_timeout_ms: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_values() {
        let config =
            AppConfig { notify_capacity: MAX_NOTIFY_CAPACITY, busy_timeout_ms: MAX_BUSY_TIMEOUT_MS, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
