//! Configuration for the portal.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `portal.toml` file (or the file passed explicitly)
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `KEYGEN_ACCOUNT_ID` - Licensing account identifier (required)
//! - `KEYGEN_API_URL` - Licensing API base URL
//! - `KEYGEN_API_VERSION` - Value of the `Keygen-Version` header
//! - `KEYGEN_TIMEOUT_SECS` - HTTP request timeout in seconds
//! - `PORTAL_DATA_DIR` - Directory holding the device fingerprint
//! - `PORTAL_LOGGING_ENABLED` - Enable logging output
//! - `PORTAL_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::{Config, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{PortalError, PortalResult};

pub const DEFAULT_API_URL: &str = "https://api.keygen.sh/v1";
pub const DEFAULT_API_VERSION: &str = "1.2";
pub const DEFAULT_ENTITLEMENT: &str = "PORTAL";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Licensing API configuration
    pub api: ApiConfig,
    /// Local storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Licensing API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Account that owns the licenses. Required.
    pub account_id: String,
    /// Base URL, without trailing slash
    pub base_url: String,
    /// API version requested via the `Keygen-Version` header
    pub version: String,
    /// Entitlements every validation is scoped to
    pub entitlements: Vec<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            base_url: DEFAULT_API_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            entitlements: vec![DEFAULT_ENTITLEMENT.to_string()],
            timeout_secs: 30,
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the fingerprint file; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

impl PortalConfig {
    /// Load from `portal.toml` in the working directory (optional) and the
    /// process environment, then validate.
    pub fn load() -> PortalResult<Self> {
        Self::load_from(None, |name| std::env::var(name).ok())
    }

    /// Load with an explicit config file and environment lookup, then validate.
    ///
    /// An explicit file must exist; without one, `portal.toml` is read if present.
    pub fn load_from<F>(file: Option<&Path>, env: F) -> PortalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::build(file, env)?;
        config.validate()?;
        Ok(config)
    }

    fn build<F>(file: Option<&Path>, env: F) -> PortalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("portal").required(false),
        };

        let settings = Config::builder()
            // Start with defaults
            .set_default("api.account_id", "")?
            .set_default("api.base_url", DEFAULT_API_URL)?
            .set_default("api.version", DEFAULT_API_VERSION)?
            .set_default("api.entitlements", vec![DEFAULT_ENTITLEMENT])?
            .set_default("api.timeout_secs", 30)?
            .set_default("logging.enabled", false)?
            .set_default("logging.level", "info")?
            // Config file
            .add_source(file_source)
            // Override with environment variables
            .set_override_option("api.account_id", env("KEYGEN_ACCOUNT_ID"))?
            .set_override_option("api.base_url", env("KEYGEN_API_URL"))?
            .set_override_option("api.version", env("KEYGEN_API_VERSION"))?
            .set_override_option(
                "api.timeout_secs",
                parse_env::<i64, _>(&env, "KEYGEN_TIMEOUT_SECS")?,
            )?
            .set_override_option("storage.data_dir", env("PORTAL_DATA_DIR"))?
            .set_override_option(
                "logging.enabled",
                parse_env::<bool, _>(&env, "PORTAL_LOGGING_ENABLED")?,
            )?
            .set_override_option("logging.level", env("PORTAL_LOG_LEVEL"))?
            .build()
            .map_err(|e| PortalError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| PortalError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PortalResult<()> {
        if self.api.account_id.trim().is_empty() {
            return Err(PortalError::ConfigError(
                "environment variable KEYGEN_ACCOUNT_ID is required".to_string(),
            ));
        }

        if !(self.api.base_url.starts_with("https://") || self.api.base_url.starts_with("http://"))
        {
            return Err(PortalError::ConfigError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(PortalError::ConfigError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(PortalError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Parse an optional environment override. A set but malformed value is an error.
fn parse_env<T, F>(env: &F, name: &str) -> PortalResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                PortalError::ConfigError(format!("invalid value '{raw}' for {name}: {e}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PortalConfig {
        let mut config = PortalConfig::default();
        config.api.account_id = "demo".to_string();
        config
    }

    #[test]
    fn malformed_numeric_and_flag_overrides_are_errors() {
        let env = |name: &str| match name {
            "KEYGEN_TIMEOUT_SECS" => Some("soon".to_string()),
            "PORTAL_LOGGING_ENABLED" => Some(" true ".to_string()),
            _ => None,
        };

        let err = parse_env::<i64, _>(&env, "KEYGEN_TIMEOUT_SECS").unwrap_err();
        assert!(matches!(err, PortalError::ConfigError(msg) if msg.contains("KEYGEN_TIMEOUT_SECS")));
        assert_eq!(parse_env::<bool, _>(&env, "PORTAL_LOGGING_ENABLED").unwrap(), Some(true));
        assert_eq!(parse_env::<i64, _>(&env, "UNSET").unwrap(), None);
    }

    #[test]
    fn defaults_are_valid_once_account_is_set() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_account_is_rejected() {
        let err = PortalConfig::default().validate().unwrap_err();
        assert!(matches!(err, PortalError::ConfigError(msg) if msg.contains("KEYGEN_ACCOUNT_ID")));
    }

    #[test]
    fn blank_account_is_rejected() {
        let mut config = valid_config();
        config.api.account_id = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut config = valid_config();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = valid_config();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }
}
