//! Port traits: the hexagonal boundary between the coordination core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ tasks / dispatcher / workflows
//! ```
//!
//! Driven adapters (gauge, sensor, radio, socket, panel, storage) implement
//! these traits.  The tasks consume them via generics, so the core never
//! touches hardware directly and every workflow runs against mocks on the
//! host.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** holds the WiFi password in the `wifi` namespace; on
//!   target that namespace lives on the encrypted NVS partition.

use std::net::Ipv4Addr;

use crate::config::DeviceConfig;
use crate::error::{ConfigError, LinkError, SensorFault, SessionError, StorageError};
use crate::provisioning::credentials::Credentials;
use crate::provisioning::portal::{PortalRequest, PortalResponse};
use crate::tasks::display::Frame;

// ───────────────────────────────────────────────────────────────
// Battery gauge (driven adapter: hardware → core)
// ───────────────────────────────────────────────────────────────

/// Fuel gauge with an explicit low-power mode between reads.
pub trait BatteryGauge {
    type Error: core::fmt::Debug;

    /// Leave sleep mode.  The cell reading needs time to settle afterwards.
    fn wake(&mut self) -> Result<(), Self::Error>;

    /// Enter sleep mode.
    fn sleep(&mut self) -> Result<(), Self::Error>;

    /// State of charge in percent.
    fn state_of_charge(&mut self) -> Result<f32, Self::Error>;

    /// Whether the low-battery alert bit is latched.
    fn alert(&mut self) -> Result<bool, Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Fingerprint sensor (driven adapter: hardware ↔ core)
// ───────────────────────────────────────────────────────────────

/// Character buffers inside the sensor that hold extracted features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharBuffer {
    One = 1,
    Two = 2,
}

/// A successful library search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub id: u16,
    pub confidence: u16,
}

/// Optical fingerprint module.  One operation at a time; callers must hold
/// the [`SensorClaim`](crate::biometric::SensorClaim).
pub trait FingerprintSensor {
    /// Capture an image.  `Err(NoFinger)` when the window is empty.
    fn capture(&mut self) -> Result<(), SensorFault>;

    /// Extract features from the last image into `buffer`.
    fn convert(&mut self, buffer: CharBuffer) -> Result<(), SensorFault>;

    /// Fast search of the whole library with buffer one.
    fn search(&mut self) -> Result<MatchResult, SensorFault>;

    /// Combine both buffers into one template.
    fn merge(&mut self) -> Result<(), SensorFault>;

    /// Persist the merged template under `id`, overwriting any previous one.
    fn store(&mut self, id: u16) -> Result<(), SensorFault>;
}

// ───────────────────────────────────────────────────────────────
// Display (driven adapter: core → panel)
// ───────────────────────────────────────────────────────────────

pub trait DisplayPort {
    /// Replace the panel contents with `frame`.
    fn show(&mut self, frame: &Frame);
}

// ───────────────────────────────────────────────────────────────
// Radio (driven adapter: core ↔ WiFi)
// ───────────────────────────────────────────────────────────────

/// Station-mode link.
pub trait LinkPort {
    /// Start associating with `credentials`.  Does not wait for the link.
    fn begin(&mut self, credentials: &Credentials) -> Result<(), LinkError>;

    /// Whether the station has an IP link right now.
    fn is_up(&self) -> bool;

    /// Drop the station link.
    fn disconnect(&mut self);
}

/// Access-point mode with a local HTTP surface.
pub trait ProvisioningPort {
    /// Start the AP and the HTTP server; returns the AP's own address.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, LinkError>;

    /// Tear down the HTTP server and the AP.
    fn stop_access_point(&mut self);

    /// SSIDs currently visible, strongest first.
    fn scan_networks(&mut self) -> Vec<String>;

    /// Next pending HTTP request, if any.
    fn next_request(&mut self) -> Option<PortalRequest>;

    /// Answer the request most recently returned by [`next_request`](Self::next_request).
    fn respond(&mut self, response: PortalResponse);
}

// ───────────────────────────────────────────────────────────────
// Socket transport (driven adapter: core ↔ remote collector)
// ───────────────────────────────────────────────────────────────

/// Events surfaced by [`SocketTransport::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    Text(String),
}

/// Message-framed socket to the remote collector.
pub trait SocketTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError>;

    fn close(&mut self);

    /// Send one text frame.
    fn send_text(&mut self, frame: &str) -> Result<(), SessionError>;

    /// Next pending event; never blocks.
    fn poll(&mut self) -> Option<SocketEvent>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: core ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration; [`DeviceConfig::default()`] when none is stored.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: core ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems.  Writes
/// MUST be atomic: no partial record survives a power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}
