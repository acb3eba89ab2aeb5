//! Crate-level error types.
//!
//! Licensing API failures are not represented here: they are accumulated on
//! the portal state as [`crate::client::errors::ApiErrorEntry`] values. This
//! type covers the failures that abort an operation before it reaches the
//! network, plus startup failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// Required configuration is missing or invalid. Fatal at startup.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The local fingerprint entry could not be read or written.
    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// The HTTP client could not be constructed.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Validation was requested without a license key.
    #[error("a license key is required")]
    MissingKey,

    /// A license-scoped operation was requested before any license is known.
    #[error("no license is known; validate a license key first")]
    MissingLicense,
}

pub type PortalResult<T> = Result<T, PortalError>;

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        PortalError::NetworkError(err.to_string())
    }
}

impl From<config::ConfigError> for PortalError {
    fn from(err: config::ConfigError) -> Self {
        PortalError::ConfigError(err.to_string())
    }
}
