//! keygen-portal - license activation portal for the Keygen licensing API
//!
//! A session enters a license key, validates it scoped to this device's
//! fingerprint, and then either activates the device as a machine, shows the
//! license, or manages the license's machines to free up seats.
//!
//! # Example
//!
//! ```rust,no_run
//! use portal::client::api::KeygenClient;
//! use portal::config::PortalConfig;
//! use portal::device::DeviceInfo;
//! use portal::fingerprint::FingerprintStore;
//! use portal::portal::Portal;
//!
//! # async fn run() -> portal::errors::PortalResult<()> {
//! let config = PortalConfig::load()?;
//! let fingerprint = FingerprintStore::default_location()?.load_or_create().await?;
//! let mut session = Portal::new(KeygenClient::new(&config.api)?, fingerprint);
//!
//! session.set_key("8A1B58-B62874-E280BF-C6DE7D-5795DC-V3");
//! session.validate_key_with_fingerprint().await?;
//! if session.view().shows_activation() {
//!     session.activate_machine(&DeviceInfo::detect()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod errors;
pub mod fingerprint;
pub mod logging;
pub mod portal;
pub mod view;

// Licensing API client
pub mod client {
    pub mod api;
    pub mod errors;
    pub mod responses;
}
