//! Persistent device fingerprint.
//!
//! The fingerprint is a random UUID generated the first time the portal runs
//! on a device and stored as a single file in the application data
//! directory:
//! - Windows: `%APPDATA%\keygen-portal\device_id`
//! - macOS: `~/Library/Application Support/keygen-portal/device_id`
//! - Linux: `~/.local/share/keygen-portal/device_id`
//!
//! Once written it is never regenerated. Logging out of the portal does not
//! touch it.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::errors::{PortalError, PortalResult};

/// Directory name under the platform data directory.
pub const APP_DIR: &str = "keygen-portal";

/// File holding the fingerprint.
const FINGERPRINT_FILE: &str = "device_id";

/// Stable per-device identifier used to scope license operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A fresh random fingerprint.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform data directory for the portal.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// File-backed store for the single fingerprint entry.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    dir: PathBuf,
}

impl FingerprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform data directory.
    pub fn default_location() -> PortalResult<Self> {
        default_data_dir().map(Self::new).ok_or_else(|| {
            PortalError::StorageError(std::io::Error::new(
                ErrorKind::NotFound,
                "Could not determine app data directory",
            ))
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FINGERPRINT_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the stored fingerprint. Missing or blank files yield `None`.
    pub async fn load(&self) -> PortalResult<Option<Fingerprint>> {
        match fs::read_to_string(self.path()).await {
            Ok(data) => {
                let value = data.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Fingerprint::new(value)))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortalError::StorageError(e)),
        }
    }

    /// Return the stored fingerprint, creating and persisting one if absent.
    pub async fn load_or_create(&self) -> PortalResult<Fingerprint> {
        if let Some(fingerprint) = self.load().await? {
            log::debug!("Loaded device fingerprint from {}", self.path().display());
            return Ok(fingerprint);
        }

        let fingerprint = Fingerprint::generate();
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.path(), fingerprint.as_str()).await?;
        log::info!("Created device fingerprint at {}", self.path().display());

        Ok(fingerprint)
    }

    /// Delete the stored fingerprint (no-op if absent).
    pub async fn forget(&self) -> PortalResult<()> {
        match fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortalError::StorageError(e)),
        }
    }
}
