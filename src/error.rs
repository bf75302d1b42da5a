//! Unified error types for the Attendo firmware.
//!
//! One small `Copy` enum per subsystem, each convertible into the top-level
//! [`Error`].  Only the two boot-time hardware probes ever treat an error as
//! fatal; everything else is retried, logged or used to abort a one-shot
//! workflow.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The fingerprint sensor reported a failure.
    Sensor(SensorFault),
    /// Network association or access-point failure.
    Link(LinkError),
    /// Remote session failure.
    Session(SessionError),
    /// Persistent storage failure.
    Storage(StorageError),
    /// The fingerprint sensor is claimed by another workflow.
    SensorBusy,
    /// A task could not be spawned.
    Spawn(&'static str),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::SensorBusy => write!(f, "fingerprint sensor busy"),
            Self::Spawn(name) => write!(f, "failed to spawn task '{name}'"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Fingerprint sensor faults
// ---------------------------------------------------------------------------

/// Outcome codes reported by the fingerprint sensor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// No finger on the sensor window.
    NoFinger,
    /// The sensor is still processing a previous request.
    SensorBusy,
    /// Serial link garbled or timed out.
    CommsError,
    /// Image capture failed.
    ImagingError,
    /// Image too noisy to extract features.
    ImageTooMessy,
    /// Feature extraction produced no usable template.
    FeatureExtractionFailed,
    /// Search completed without a match.
    NotFound,
    /// The two enrollment samples do not belong to the same finger.
    MismatchedSamples,
    /// Template id outside the library.
    BadLocation,
    /// Template library full.
    StorageFull,
    /// Flash write inside the sensor failed.
    StorageError,
}

impl SensorFault {
    /// Faults that are retried in place with a short backoff.
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::NoFinger | Self::SensorBusy | Self::CommsError | Self::ImagingError
        )
    }
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFinger => write!(f, "no finger"),
            Self::SensorBusy => write!(f, "sensor busy"),
            Self::CommsError => write!(f, "communication error"),
            Self::ImagingError => write!(f, "imaging error"),
            Self::ImageTooMessy => write!(f, "image too messy"),
            Self::FeatureExtractionFailed => write!(f, "feature extraction failed"),
            Self::NotFound => write!(f, "no match"),
            Self::MismatchedSamples => write!(f, "samples do not match"),
            Self::BadLocation => write!(f, "template id out of range"),
            Self::StorageFull => write!(f, "template storage full"),
            Self::StorageError => write!(f, "template storage error"),
        }
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    AssociationFailed,
    Timeout,
    AccessPointFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials stored"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (at most 64 bytes)"),
            Self::AssociationFailed => write!(f, "association failed"),
            Self::Timeout => write!(f, "association timed out"),
            Self::AccessPointFailed => write!(f, "access point could not be started"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    ConnectFailed,
    NotConnected,
    SendFailed,
    Encode,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "socket connect failed"),
            Self::NotConnected => write!(f, "socket not connected"),
            Self::SendFailed => write!(f, "socket send failed"),
            Self::Encode => write!(f, "message encoding failed"),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`StoragePort`](crate::app::ports::StoragePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Stored bytes failed to deserialize.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored record corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
