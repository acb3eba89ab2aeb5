//! Error types for the licensing API client.
//!
//! The licensing service reports failures as a JSON array of error objects:
//!
//! ```json
//! {
//!   "errors": [
//!     {
//!       "title": "Unprocessable resource",
//!       "detail": "machine count has exceeded maximum allowed by current policy (1)",
//!       "code": "MACHINE_LIMIT_EXCEEDED",
//!       "source": { "pointer": "/data" }
//!     }
//!   ]
//! }
//! ```
//!
//! Every client call resolves to either a success payload or a
//! [`ClientError`], which always converts into a non-empty list of
//! [`ApiErrorEntry`] values for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error code returned when a license has no free machine seats left.
pub const MACHINE_LIMIT_EXCEEDED: &str = "MACHINE_LIMIT_EXCEEDED";

/// Points at the part of the request document an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// A single structured error from the licensing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    /// Short summary, e.g. "Unauthorized".
    pub title: String,
    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Machine-readable code, e.g. `MACHINE_LIMIT_EXCEEDED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

impl ApiErrorEntry {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: Some(detail.into()),
            code: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source = Some(ErrorSource {
            pointer: Some(pointer.into()),
            parameter: None,
        });
        self
    }

    /// The source pointer, if the service attached one.
    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.pointer.as_deref())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// True when the error means every seat on the license is taken.
    pub fn is_machine_limit_exceeded(&self) -> bool {
        self.has_code(MACHINE_LIMIT_EXCEEDED)
    }
}

impl fmt::Display for ApiErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Failure of a single licensing API call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with one or more structured errors.
    #[error("licensing API returned {} error(s)", .0.len())]
    Api(Vec<ApiErrorEntry>),

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not match the expected document shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The request could not be built from the given input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Build an `Api` error, or a `Decode` error when the service sent an
    /// empty error list (so the result is never an empty list).
    pub fn from_entries(entries: Vec<ApiErrorEntry>) -> Self {
        if entries.is_empty() {
            ClientError::Decode("error response without error entries".to_string())
        } else {
            ClientError::Api(entries)
        }
    }

    /// Flatten into displayable entries. Never returns an empty list.
    pub fn into_entries(self) -> Vec<ApiErrorEntry> {
        match self {
            ClientError::Api(entries) if !entries.is_empty() => entries,
            ClientError::Api(_) => vec![ApiErrorEntry::new(
                "Unexpected response",
                "error response without error entries",
            )],
            ClientError::Network(err) => vec![ApiErrorEntry::new("Network error", err.to_string())],
            ClientError::Decode(detail) => vec![ApiErrorEntry::new("Unexpected response", detail)],
            ClientError::InvalidRequest(detail) => {
                vec![ApiErrorEntry::new("Invalid request", detail)]
            }
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
