//! Resource types returned by the licensing API.
//!
//! The service speaks JSON:API: resources carry an `id`, a `type` and an
//! `attributes` object, and every response body is a document with optional
//! `meta`, `data` and `errors` members.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::errors::{ApiErrorEntry, ClientError, ClientResult};

/// Validation codes reported in the `meta` of a validate-key response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Valid,
    NotFound,
    Suspended,
    Expired,
    Overdue,
    Banned,
    NoMachine,
    NoMachines,
    TooManyMachines,
    TooManyCores,
    TooManyProcesses,
    FingerprintScopeRequired,
    FingerprintScopeMismatch,
    FingerprintScopeEmpty,
    HeartbeatNotStarted,
    HeartbeatDead,
    ProductScopeRequired,
    ProductScopeMismatch,
    PolicyScopeRequired,
    PolicyScopeMismatch,
    MachineScopeRequired,
    MachineScopeMismatch,
    EntitlementsMissing,
    EntitlementsScopeEmpty,
    /// Any code this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl ValidationCode {
    /// Parse a raw code string. Unrecognised codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.to_string()))
            .unwrap_or(ValidationCode::Unknown)
    }

    /// True when activating this device would let the key validate.
    pub fn requires_activation(&self) -> bool {
        matches!(
            self,
            ValidationCode::FingerprintScopeMismatch
                | ValidationCode::NoMachines
                | ValidationCode::NoMachine
        )
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ValidationCode::Valid => "License is valid",
            ValidationCode::NotFound => "License key was not found",
            ValidationCode::Suspended => "License is suspended",
            ValidationCode::Expired => "License has expired",
            ValidationCode::Overdue => "License is overdue for check-in",
            ValidationCode::Banned => "License owner is banned",
            ValidationCode::NoMachine => "This device has not been activated",
            ValidationCode::NoMachines => "No devices have been activated",
            ValidationCode::TooManyMachines => "License has too many activated devices",
            ValidationCode::TooManyCores => "License has too many activated cores",
            ValidationCode::TooManyProcesses => "License has too many running processes",
            ValidationCode::FingerprintScopeRequired => "A device fingerprint is required",
            ValidationCode::FingerprintScopeMismatch => "This device is not activated for the license",
            ValidationCode::FingerprintScopeEmpty => "The device fingerprint scope is empty",
            ValidationCode::HeartbeatNotStarted => "Device heartbeat has not started",
            ValidationCode::HeartbeatDead => "Device heartbeat is dead",
            ValidationCode::ProductScopeRequired => "A product scope is required",
            ValidationCode::ProductScopeMismatch => "License does not belong to the product",
            ValidationCode::PolicyScopeRequired => "A policy scope is required",
            ValidationCode::PolicyScopeMismatch => "License does not belong to the policy",
            ValidationCode::MachineScopeRequired => "A machine scope is required",
            ValidationCode::MachineScopeMismatch => "License does not belong to the machine",
            ValidationCode::EntitlementsMissing => "License is missing required entitlements",
            ValidationCode::EntitlementsScopeEmpty => "The entitlements scope is empty",
            ValidationCode::Unknown => "Unknown validation code",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_message())
    }
}

/// Result of the last validate-key call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    /// Raw code string as sent by the service.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl Validation {
    pub fn code(&self) -> ValidationCode {
        ValidationCode::from_code(&self.code)
    }

    /// Invalid, but activating this device may fix it.
    pub fn requires_activation(&self) -> bool {
        !self.valid && self.code().requires_activation()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAttributes {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_machines: Option<u32>,
}

/// The license resource a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub attributes: LicenseAttributes,
}

impl License {
    pub fn key(&self) -> &str {
        &self.attributes.key
    }

    /// Seat limit, or 0 when the policy does not report one.
    pub fn max_machines(&self) -> u32 {
        self.attributes.max_machines.unwrap_or(0)
    }

    /// `"used/max"` seat usage label.
    pub fn seats_label(&self, used: usize) -> String {
        format!("{}/{}", used, self.max_machines())
    }
}

/// Browser/version metadata attached to a machine at activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl MachineMetadata {
    pub fn is_empty(&self) -> bool {
        self.browser.is_none() && self.version.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAttributes {
    pub fingerprint: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub metadata: MachineMetadata,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// One activated device on a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub attributes: MachineAttributes,
}

impl Machine {
    pub fn fingerprint(&self) -> &str {
        &self.attributes.fingerprint
    }

    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// `"browser version"`, or `None` when no metadata was recorded.
    pub fn browser_label(&self) -> Option<String> {
        let meta = &self.attributes.metadata;
        if meta.is_empty() {
            return None;
        }
        let parts: Vec<&str> = [meta.browser.as_deref(), meta.version.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        Some(parts.join(" "))
    }
}

/// Successful validate-key response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValidation {
    pub validation: Validation,
    /// Present whenever the key maps to a known license, valid or not.
    pub license: Option<License>,
}

/// Date portion of a timestamp, `N/A` when absent.
pub fn format_date(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|t| t.date_naive().to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

// === Wire documents ===

/// Top-level response body of every licensing API call.
#[derive(Debug, Deserialize)]
pub(crate) struct Document<M, D> {
    pub meta: Option<M>,
    pub data: Option<D>,
    pub errors: Option<Vec<ApiErrorEntry>>,
}

impl<M, D> Document<M, D> {
    /// Split into the error list (if any) and the remaining members.
    pub fn into_result(self) -> ClientResult<(Option<M>, Option<D>)> {
        match self.errors {
            Some(errors) => Err(ClientError::from_entries(errors)),
            None => Ok((self.meta, self.data)),
        }
    }
}

pub(crate) type ValidateKeyDocument = Document<Validation, License>;
pub(crate) type MachineDocument = Document<serde_json::Value, Machine>;
pub(crate) type MachineListDocument = Document<serde_json::Value, Vec<Machine>>;
pub(crate) type ErrorDocument = Document<serde_json::Value, serde_json::Value>;

impl ValidateKeyDocument {
    pub fn into_key_validation(self) -> ClientResult<KeyValidation> {
        let (meta, license) = self.into_result()?;
        let validation = meta
            .ok_or_else(|| ClientError::Decode("validation response without meta".to_string()))?;
        Ok(KeyValidation {
            validation,
            license,
        })
    }
}
