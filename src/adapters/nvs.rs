//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] on top of one small
//! blob layer (`get_blob` / `put_blob` / `erase_blob`) with an ESP-IDF and
//! an in-memory backend.
//!
//! # Security
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Encrypted NVS: on ESP32 the `wifi` namespace lives on the encrypted
//!   NVS partition. The simulation backend uses plaintext (dev/test only).
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{info, warn};

use crate::app::ports::{ConfigPort, StoragePort};
use crate::config::DeviceConfig;
use crate::error::{ConfigError, StorageError};
use crate::menu::MenuAction;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;
#[cfg(not(target_os = "espidf"))]
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "attendo";
const CONFIG_KEY: &str = "devcfg";

/// Largest blob the adapter will read back.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl NvsAdapter {
    /// Create the adapter.  On target this initialises NVS flash, erasing
    /// and re-initialising the partition after a layout version change.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the main task before any other NVS user.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                // SAFETY: as above.
                let ok = unsafe { nvs_flash_erase() == ESP_OK as i32 && nvs_flash_init() == ESP_OK as i32 };
                if !ok {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NVS: flash ready");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NVS: simulation backend");
            Ok(Self {
                entries: Mutex::new(HashMap::new()),
            })
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Blob layer: in-memory backend
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    fn entries(&self) -> MutexGuard<'_, HashMap<(String, String), Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_blob(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries().get(&(namespace.to_owned(), key.to_owned())).cloned())
    }

    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.entries().insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(())
    }

    fn erase_blob(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.entries().remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Blob layer: ESP-IDF backend
// ───────────────────────────────────────────────────────────────

/// An open namespace, closed on drop.
#[cfg(target_os = "espidf")]
struct Namespace(nvs_handle_t);

#[cfg(target_os = "espidf")]
impl Namespace {
    fn open(namespace: &str, write: bool) -> Result<Self, esp_err_t> {
        let name = c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        check(unsafe { nvs_open(name.as_ptr() as *const _, mode, &mut handle) })?;
        Ok(Self(handle))
    }

    fn commit(&self) -> Result<(), esp_err_t> {
        // SAFETY: the handle is open for writing.
        check(unsafe { nvs_commit(self.0) })
    }
}

#[cfg(target_os = "espidf")]
impl Drop for Namespace {
    fn drop(&mut self) {
        // SAFETY: opened in `Namespace::open`, closed exactly once here.
        unsafe { nvs_close(self.0) }
    }
}

/// NVS names are at most 15 bytes plus the terminator.
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), esp_err_t> {
    if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
}

#[cfg(target_os = "espidf")]
fn storage_error(ret: esp_err_t) -> StorageError {
    if ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
        StorageError::Full
    } else {
        warn!("NVS: error {}", ret);
        StorageError::IoError
    }
}

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let not_found = |e: esp_err_t| e == ESP_ERR_NVS_NOT_FOUND as i32;
        let ns = match Namespace::open(namespace, false) {
            Ok(ns) => ns,
            Err(e) if not_found(e) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        let key = c_name(key);

        let mut size: usize = 0;
        // SAFETY: a null buffer asks only for the stored length.
        match check(unsafe { nvs_get_blob(ns.0, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size) }) {
            Ok(()) => {}
            Err(e) if not_found(e) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        }
        if size > MAX_BLOB_SIZE {
            return Err(StorageError::Corrupted);
        }

        let mut buf = vec![0u8; size];
        // SAFETY: `buf` holds exactly `size` writable bytes.
        check(unsafe { nvs_get_blob(ns.0, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size) })
            .map_err(storage_error)?;
        buf.truncate(size);
        Ok(Some(buf))
    }

    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let ns = Namespace::open(namespace, true).map_err(storage_error)?;
        let key = c_name(key);
        // SAFETY: `data` is valid for `data.len()` bytes for the call.
        check(unsafe { nvs_set_blob(ns.0, key.as_ptr() as *const _, data.as_ptr() as *const _, data.len()) })
            .and_then(|()| ns.commit())
            .map_err(storage_error)
    }

    fn erase_blob(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let not_found = |e: esp_err_t| e == ESP_ERR_NVS_NOT_FOUND as i32;
        let ns = match Namespace::open(namespace, true) {
            Ok(ns) => ns,
            // A namespace that was never created has nothing to delete.
            Err(e) if not_found(e) => return Ok(()),
            Err(e) => return Err(storage_error(e)),
        };
        let key = c_name(key);
        // SAFETY: `key` is NUL-terminated.
        match check(unsafe { nvs_erase_key(ns.0, key.as_ptr() as *const _) }) {
            Ok(()) => ns.commit().map_err(storage_error),
            Err(e) if not_found(e) => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

pub fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    if cfg.menu.len() < 2 {
        return Err(ConfigError::ValidationFailed("menu needs 2-4 items"));
    }
    if !cfg.features.biometrics && cfg.menu.contains(&MenuAction::ToggleMatch) {
        return Err(ConfigError::ValidationFailed(
            "ToggleMatch menu item requires the biometrics feature",
        ));
    }
    if cfg.server_host.is_empty() || cfg.server_port == 0 {
        return Err(ConfigError::ValidationFailed("server_host/server_port must be set"));
    }
    if cfg.ap_ssid.is_empty() {
        return Err(ConfigError::ValidationFailed("ap_ssid must not be empty"));
    }
    if !cfg.ap_password.is_empty() && cfg.ap_password.len() < 8 {
        return Err(ConfigError::ValidationFailed(
            "ap_password must be empty or 8-64 bytes",
        ));
    }
    if !(100..=5000).contains(&cfg.link_tick_ms) {
        return Err(ConfigError::ValidationFailed("link_tick_ms must be 100-5000"));
    }
    if !(1..=30).contains(&cfg.link_attempts) {
        return Err(ConfigError::ValidationFailed("link_attempts must be 1-30"));
    }
    if !(100..=10_000).contains(&cfg.link_retry_ms) {
        return Err(ConfigError::ValidationFailed("link_retry_ms must be 100-10000"));
    }
    if !(1000..=10_000).contains(&cfg.battery_settle_ms) {
        return Err(ConfigError::ValidationFailed("battery_settle_ms must be 1000-10000"));
    }
    if !(1000..=600_000).contains(&cfg.battery_idle_ms) {
        return Err(ConfigError::ValidationFailed("battery_idle_ms must be 1000-600000"));
    }
    if !(1..=32).contains(&cfg.battery_alert_percent) {
        return Err(ConfigError::ValidationFailed("battery_alert_percent must be 1-32"));
    }
    if !(20..=1000).contains(&cfg.display_refresh_ms) {
        return Err(ConfigError::ValidationFailed("display_refresh_ms must be 20-1000"));
    }
    if !(5..=500).contains(&cfg.dispatcher_poll_ms) || !(5..=500).contains(&cfg.session_poll_ms) {
        return Err(ConfigError::ValidationFailed(
            "dispatcher_poll_ms/session_poll_ms must be 5-500",
        ));
    }
    if !(1..=300).contains(&cfg.match_threshold) {
        return Err(ConfigError::ValidationFailed("match_threshold must be 1-300"));
    }
    if !(1..=1000).contains(&cfg.sensor_capacity) {
        return Err(ConfigError::ValidationFailed("sensor_capacity must be 1-1000"));
    }
    if !(10..=1000).contains(&cfg.sensor_backoff_ms) {
        return Err(ConfigError::ValidationFailed("sensor_backoff_ms must be 10-1000"));
    }
    if !(1000..=60_000).contains(&cfg.lift_timeout_ms) {
        return Err(ConfigError::ValidationFailed("lift_timeout_ms must be 1000-60000"));
    }
    if !(1000..=120_000).contains(&cfg.sample_timeout_ms) {
        return Err(ConfigError::ValidationFailed("sample_timeout_ms must be 1000-120000"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        match self.get_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(Some(bytes)) => {
                let cfg: DeviceConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NVS: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Ok(None) => {
                info!("NVS: no stored config, using defaults");
                Ok(DeviceConfig::default())
            }
            Err(e) => {
                warn!("NVS: config read failed ({}), using defaults", e);
                Ok(DeviceConfig::default())
            }
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| match e {
            StorageError::Full => ConfigError::StorageFull,
            _ => ConfigError::IoError,
        })?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.get_blob(namespace, key)?.ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.erase_blob(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        matches!(self.get_blob(namespace, key), Ok(Some(_)))
    }
}
