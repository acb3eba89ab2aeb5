//! Structured logging for licensing session events.

use tracing::{info, info_span, warn};
use tracing::level_filters::LevelFilter;

use crate::config::LoggingConfig;

/// Licensing session event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEvent {
    /// A key validated successfully
    Validated,
    /// A key was recognised but did not validate
    ValidationFailed,
    /// This device was activated as a machine
    Activated,
    /// Activation was rejected
    ActivationFailed,
    /// A machine was deactivated
    Deactivated,
    /// The machine list was refreshed
    MachinesListed,
    /// A licensing API call returned errors
    ApiError,
    /// The session was reset
    Reset,
}

impl std::fmt::Display for PortalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PortalEvent::Validated => "validated",
            PortalEvent::ValidationFailed => "validation_failed",
            PortalEvent::Activated => "activated",
            PortalEvent::ActivationFailed => "activation_failed",
            PortalEvent::Deactivated => "deactivated",
            PortalEvent::MachinesListed => "machines_listed",
            PortalEvent::ApiError => "api_error",
            PortalEvent::Reset => "reset",
        };
        write!(f, "{}", s)
    }
}

/// Log a licensing session event.
///
/// # Arguments
///
/// * `event` - The type of event
/// * `subject` - License id, machine id or fingerprint the event concerns
/// * `details` - Optional additional details
pub fn log_portal_event(event: PortalEvent, subject: &str, details: Option<&str>) {
    let span = info_span!(
        "portal_event",
        event = %event,
        subject = %subject,
    );
    let _enter = span.enter();

    match event {
        PortalEvent::ValidationFailed | PortalEvent::ActivationFailed | PortalEvent::ApiError => {
            if let Some(d) = details {
                warn!(reason = %d, "Portal event occurred");
            } else {
                warn!("Portal event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Portal event occurred");
            } else {
                info!("Portal event occurred");
            }
        }
    }
}

/// Map a configured level name to a filter. Unknown names fall back to `INFO`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Install the global fmt subscriber when logging is enabled.
///
/// Returns `false` if logging is disabled or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    tracing_subscriber::fmt()
        .with_max_level(level_filter(&config.level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
