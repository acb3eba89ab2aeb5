//! View selection for the portal.
//!
//! [`select_view`] is a pure function of the session state; it decides which
//! panels the front-end shows and knows nothing about how they are drawn.

use crate::client::responses::{License, Validation};
use crate::portal::RaisedError;

/// What the front-end should present for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalView {
    /// Errors first, then license info. The machine manager is added when a
    /// seat-limit error means the user needs to free a seat.
    Errors { show_manager: bool },
    /// Nothing validated yet: ask for a license key.
    KeyEntry,
    /// Key is valid: license info and the machine manager.
    Manage,
    /// Key is known but this device is not activated: license info and the
    /// activation form.
    Activate,
    /// Key is known but invalid for some other reason: license info only.
    LicenseOnly,
}

impl PortalView {
    pub fn shows_errors(&self) -> bool {
        matches!(self, PortalView::Errors { .. })
    }

    pub fn shows_license_info(&self) -> bool {
        !matches!(self, PortalView::KeyEntry)
    }

    pub fn shows_manager(&self) -> bool {
        matches!(
            self,
            PortalView::Manage | PortalView::Errors { show_manager: true }
        )
    }

    pub fn shows_activation(&self) -> bool {
        matches!(self, PortalView::Activate)
    }
}

/// Choose the view for `(errors, license, validation)`.
///
/// Precedence: errors, then the empty session, then validity, then the
/// validation code.
pub fn select_view(
    errors: &[RaisedError],
    license: Option<&License>,
    validation: Option<&Validation>,
) -> PortalView {
    if !errors.is_empty() {
        let show_manager =
            license.is_some() && errors.iter().any(|e| e.entry.is_machine_limit_exceeded());
        return PortalView::Errors { show_manager };
    }

    let Some(validation) = validation else {
        return match license {
            None => PortalView::KeyEntry,
            Some(_) => PortalView::LicenseOnly,
        };
    };

    if validation.valid {
        PortalView::Manage
    } else if validation.code().requires_activation() {
        PortalView::Activate
    } else {
        PortalView::LicenseOnly
    }
}
