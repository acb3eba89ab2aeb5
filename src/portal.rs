//! The licensing session state machine.
//!
//! A [`Portal`] owns everything one session knows: the key being worked on,
//! this device's fingerprint, the last validation, the license it resolved
//! to, the license's machines and any pending API errors. State changes only
//! through the transition operations below; each one awaits its remote call
//! and any follow-up calls in a fixed order.
//!
//! | operation | on error | on success |
//! |-----------|----------|------------|
//! | [`Portal::validate_key_with_fingerprint`] | append errors | set validation + license, list machines if a license came back |
//! | [`Portal::activate_machine`] | list machines, then append errors | clear errors, list machines, revalidate |
//! | [`Portal::deactivate_machine`] | append errors | clear errors, list machines, revalidate |
//! | [`Portal::list_machines`] | append errors, keep stale list | replace list |
//!
//! Local precondition failures (no key, no license) are returned as
//! [`PortalError`] and leave the state untouched.

use crate::client::api::LicensingApi;
use crate::client::errors::ApiErrorEntry;
use crate::client::responses::{License, Machine, Validation};
use crate::device::DeviceInfo;
use crate::errors::{PortalError, PortalResult};
use crate::fingerprint::Fingerprint;
use crate::logging::{log_portal_event, PortalEvent};
use crate::view::{select_view, PortalView};

/// Identity of one raised error, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorId(pub(crate) u64);

/// An API error waiting to be dismissed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedError {
    pub id: ErrorId,
    pub entry: ApiErrorEntry,
}

/// Session data, read-only outside of [`Portal`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicensingState {
    pub key: Option<String>,
    pub validation: Option<Validation>,
    pub license: Option<License>,
    pub machines: Vec<Machine>,
    pub errors: Vec<RaisedError>,
}

pub struct Portal<A> {
    api: A,
    fingerprint: Fingerprint,
    state: LicensingState,
    next_error_id: u64,
}

impl<A: LicensingApi> Portal<A> {
    pub fn new(api: A, fingerprint: Fingerprint) -> Self {
        Self {
            api,
            fingerprint,
            state: LicensingState::default(),
            next_error_id: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn state(&self) -> &LicensingState {
        &self.state
    }

    pub fn key(&self) -> Option<&str> {
        self.state.key.as_deref()
    }

    pub fn validation(&self) -> Option<&Validation> {
        self.state.validation.as_ref()
    }

    pub fn license(&self) -> Option<&License> {
        self.state.license.as_ref()
    }

    pub fn machines(&self) -> &[Machine] {
        &self.state.machines
    }

    pub fn errors(&self) -> &[RaisedError] {
        &self.state.errors
    }

    /// Whether a machine with this device's fingerprint is in the list.
    pub fn is_current_device_activated(&self) -> bool {
        self.state
            .machines
            .iter()
            .any(|m| m.fingerprint() == self.fingerprint.as_str())
    }

    pub fn view(&self) -> PortalView {
        select_view(
            &self.state.errors,
            self.state.license.as_ref(),
            self.state.validation.as_ref(),
        )
    }

    pub fn set_key(&mut self, value: impl Into<String>) {
        self.state.key = Some(value.into());
    }

    /// Remove exactly one pending error. Returns `false` if `id` is unknown.
    pub fn clear_error(&mut self, id: ErrorId) -> bool {
        match self.state.errors.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.state.errors.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Log out: forget key, validation, license, machines and errors.
    /// The fingerprint is kept.
    pub fn reset(&mut self) {
        self.state = LicensingState::default();
        log_portal_event(PortalEvent::Reset, self.fingerprint.as_str(), None);
    }

    /// Validate the current key scoped to this device.
    ///
    /// A returned license is recorded even when the key is invalid, and its
    /// machines are listed so seat usage is visible before activation.
    pub async fn validate_key_with_fingerprint(&mut self) -> PortalResult<()> {
        let key = match self.state.key.as_deref() {
            Some(k) if !k.trim().is_empty() => k.to_string(),
            _ => return Err(PortalError::MissingKey),
        };

        let result = self.api.validate_key(&key, &self.fingerprint).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.append_errors(err.into_entries());
                return Ok(());
            }
        };

        let subject = outcome
            .license
            .as_ref()
            .map(|l| l.id.clone())
            .unwrap_or_else(|| self.fingerprint.to_string());
        if outcome.validation.valid {
            log_portal_event(PortalEvent::Validated, &subject, None);
        } else {
            log_portal_event(
                PortalEvent::ValidationFailed,
                &subject,
                Some(&outcome.validation.code),
            );
        }

        let has_license = outcome.license.is_some();
        self.state.validation = Some(outcome.validation);
        self.state.license = outcome.license;

        if has_license {
            self.list_machines().await?;
        } else {
            // Machines belong to the previous license, if any.
            self.state.machines.clear();
        }

        Ok(())
    }

    /// Activate this device on the current license.
    pub async fn activate_machine(&mut self, device: &DeviceInfo) -> PortalResult<()> {
        let license = self.state.license.as_ref().ok_or(PortalError::MissingLicense)?;

        let result = self
            .api
            .activate_machine(license, &self.fingerprint, device)
            .await;

        match result {
            Ok(machine) => {
                log_portal_event(PortalEvent::Activated, &machine.id, Some(&device.name));
                self.state.errors.clear();
                self.list_machines().await?;
                self.validate_key_with_fingerprint().await
            }
            Err(err) => {
                let entries = err.into_entries();
                log_portal_event(
                    PortalEvent::ActivationFailed,
                    self.fingerprint.as_str(),
                    entries.first().map(|e| e.title.as_str()),
                );
                // Refresh first so the seat table is current when the error shows.
                self.list_machines().await?;
                self.append_errors(entries);
                Ok(())
            }
        }
    }

    /// Deactivate machine `machine_id` on the current license.
    pub async fn deactivate_machine(&mut self, machine_id: &str) -> PortalResult<()> {
        let license = self.state.license.as_ref().ok_or(PortalError::MissingLicense)?;

        match self.api.deactivate_machine(license, machine_id).await {
            Ok(()) => {
                log_portal_event(PortalEvent::Deactivated, machine_id, None);
                self.state.errors.clear();
                self.list_machines().await?;
                self.validate_key_with_fingerprint().await
            }
            Err(err) => {
                self.append_errors(err.into_entries());
                Ok(())
            }
        }
    }

    /// Refresh the machine list for the current license.
    pub async fn list_machines(&mut self) -> PortalResult<()> {
        let license = self.state.license.as_ref().ok_or(PortalError::MissingLicense)?;

        match self.api.list_machines(license).await {
            Ok(machines) => {
                log_portal_event(
                    PortalEvent::MachinesListed,
                    &license.id,
                    Some(&format!("{} machine(s)", machines.len())),
                );
                self.state.machines = machines;
            }
            Err(err) => self.append_errors(err.into_entries()),
        }

        Ok(())
    }

    fn append_errors(&mut self, entries: Vec<ApiErrorEntry>) {
        for entry in entries {
            log_portal_event(PortalEvent::ApiError, &entry.title, entry.detail.as_deref());
            self.next_error_id += 1;
            self.state.errors.push(RaisedError {
                id: ErrorId(self.next_error_id),
                entry,
            });
        }
    }
}
