//! Stored WiFi credentials.
//!
//! One JSON record, `{"ssid": "...", "password": "..."}`, in namespace
//! `wifi` under key `config`.  Written by the provisioning portal, read on
//! every association attempt, deleted by the reset menu item.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::error::{LinkError, StorageError};

pub const CREDENTIALS_NAMESPACE: &str = "wifi";
pub const CREDENTIALS_KEY: &str = "config";

/// Upper bound on the encoded record: 96 bytes of SSID and password, each
/// byte at most six once JSON-escaped (`\u001f`), plus the keys.
const MAX_RECORD_LEN: usize = 640;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    /// Build validated credentials.
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: ssid.to_owned(),
            password: password.to_owned(),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// 1 to 32 bytes of UTF-8.  Scanned networks are offered verbatim, so
/// names like "Café" must round-trip.
pub fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

/// Any password up to 64 bytes; the access point decides whether it is
/// acceptable.
pub fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Persistence
// ───────────────────────────────────────────────────────────────

/// Load the stored record.  `Ok(None)` when nothing is stored or the record
/// is malformed (both mean "provision again").
pub fn load(storage: &impl StoragePort) -> Result<Option<Credentials>, StorageError> {
    let mut buf = [0u8; MAX_RECORD_LEN];
    let len = match storage.read(CREDENTIALS_NAMESPACE, CREDENTIALS_KEY, &mut buf) {
        Ok(len) => len,
        Err(StorageError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<Credentials>(&buf[..len]) {
        Ok(c) if validate_ssid(&c.ssid).is_ok() && validate_password(&c.password).is_ok() => Ok(Some(c)),
        Ok(_) => {
            warn!("WiFi: stored credentials fail validation, ignoring");
            Ok(None)
        }
        Err(e) => {
            warn!("WiFi: stored credentials malformed ({}), ignoring", e);
            Ok(None)
        }
    }
}

pub fn save(storage: &mut impl StoragePort, credentials: &Credentials) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(credentials).map_err(|_| StorageError::IoError)?;
    storage.write(CREDENTIALS_NAMESPACE, CREDENTIALS_KEY, &bytes)?;
    info!("WiFi: credentials saved (SSID='{}')", credentials.ssid);
    Ok(())
}

pub fn forget(storage: &mut impl StoragePort) -> Result<(), StorageError> {
    storage.delete(CREDENTIALS_NAMESPACE, CREDENTIALS_KEY)?;
    info!("WiFi: credentials forgotten");
    Ok(())
}
