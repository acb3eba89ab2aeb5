//! Description of the current device, sent when activating a machine.

use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// Client name reported as the machine's `browser` metadata.
pub const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");

/// Client version reported as the machine's `version` metadata.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Display name of the machine.
    pub name: String,
    /// Operating system and architecture, e.g. `linux-x86_64`.
    pub platform: String,
    /// Client application performing the activation.
    pub browser: String,
    /// Client application version.
    pub version: String,
}

impl DeviceInfo {
    /// Collect information about the current device.
    ///
    /// The name is `Demo Device xxxxx`, where `xxxxx` is random per call.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            name: default_device_name(),
            platform: format!("{}-{}", env::consts::OS, env::consts::ARCH),
            browser: CLIENT_NAME.to_string(),
            version: CLIENT_VERSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

fn default_device_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("Demo Device {}", &id[..5])
}
