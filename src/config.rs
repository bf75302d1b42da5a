//! Device configuration parameters
//!
//! All tunable parameters for the Attendo terminal.  One configurable core
//! covers every hardware variant: feature flags switch the access-point
//! fallback and the fingerprint/session features on or off, and the menu
//! item list fixes the number and order of menu slots.
//! Values can be overridden via NVS (non-volatile storage).

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::menu::MenuAction;

/// Upper bound on menu slots (the panel shows four text rows).
pub const MAX_MENU_ITEMS: usize = 4;

/// Optional subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Fall back to access-point provisioning when stored credentials fail.
    pub provisioning_ap: bool,
    /// Fingerprint sensor and remote session present.
    pub biometrics: bool,
}

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub features: FeatureFlags,
    /// Menu slots in display order.
    pub menu: heapless::Vec<MenuAction, MAX_MENU_ITEMS>,

    // --- Remote collector ---
    pub server_host: heapless::String<64>,
    pub server_port: u16,

    // --- Provisioning access point ---
    pub ap_ssid: heapless::String<32>,
    pub ap_password: heapless::String<64>,

    // --- Connectivity ---
    /// Connectivity task tick (milliseconds)
    pub link_tick_ms: u32,
    /// Association polls per attempt before giving up
    pub link_attempts: u8,
    /// Delay between association polls (milliseconds)
    pub link_retry_ms: u32,

    // --- Battery gauge ---
    /// Wake-to-read stabilisation delay (milliseconds)
    pub battery_settle_ms: u32,
    /// Sleep between gauge reads (milliseconds)
    pub battery_idle_ms: u32,
    /// Low-battery alert threshold programmed into the gauge (percent)
    pub battery_alert_percent: u8,

    // --- Display / dispatcher / session cadence ---
    pub display_refresh_ms: u32,
    pub dispatcher_poll_ms: u32,
    pub session_poll_ms: u32,

    // --- Biometrics ---
    /// Minimum search confidence; a match must score strictly above it.
    pub match_threshold: u16,
    /// Number of template slots in the sensor library.
    pub sensor_capacity: u16,
    /// Backoff after a transient sensor error (milliseconds)
    pub sensor_backoff_ms: u32,
    /// Maximum wait for the finger to be lifted between enroll samples
    pub lift_timeout_ms: u32,
    /// Maximum wait for a finger during each enroll sample
    pub sample_timeout_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut menu = heapless::Vec::new();
        // Capacity is MAX_MENU_ITEMS; three pushes cannot fail.
        let _ = menu.push(MenuAction::ToggleSession);
        let _ = menu.push(MenuAction::ToggleMatch);
        let _ = menu.push(MenuAction::ResetWifi);

        Self {
            features: FeatureFlags {
                provisioning_ap: true,
                biometrics: true,
            },
            menu,

            server_host: fixed_str("collector.local"),
            server_port: 8080,

            ap_ssid: fixed_str("ESP32-AP"),
            ap_password: fixed_str("password"),

            link_tick_ms: 1000,
            link_attempts: 10,
            link_retry_ms: 1000,

            battery_settle_ms: 1000,
            battery_idle_ms: 10_000,
            battery_alert_percent: 20,

            display_refresh_ms: 100,
            dispatcher_poll_ms: 20,
            session_poll_ms: 50,

            match_threshold: 50,
            sensor_capacity: 127,
            sensor_backoff_ms: 50,
            lift_timeout_ms: 10_000,
            sample_timeout_ms: 30_000,
        }
    }
}

impl DeviceConfig {
    /// Two-item menu used by the provisioning-only board (no sensor).
    pub fn provisioning_only() -> Self {
        let mut menu = heapless::Vec::new();
        let _ = menu.push(MenuAction::ToggleSession);
        let _ = menu.push(MenuAction::ResetWifi);
        Self {
            features: FeatureFlags {
                provisioning_ap: true,
                biometrics: false,
            },
            menu,
            ..Self::default()
        }
    }

    pub fn link_tick(&self) -> Duration {
        Duration::from_millis(self.link_tick_ms as u64)
    }

    pub fn link_retry(&self) -> Duration {
        Duration::from_millis(self.link_retry_ms as u64)
    }

    pub fn sensor_backoff(&self) -> Duration {
        Duration::from_millis(self.sensor_backoff_ms as u64)
    }

    pub fn lift_timeout(&self) -> Duration {
        Duration::from_millis(self.lift_timeout_ms as u64)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms as u64)
    }
}

/// Build a fixed-capacity string, truncating on overflow.
pub fn fixed_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = DeviceConfig::default();
        assert!(c.link_attempts > 0);
        assert!(c.link_tick_ms > 0);
        assert!(c.battery_settle_ms >= 1000, "gauge needs at least 1s to settle");
        assert!(c.battery_idle_ms > c.battery_settle_ms);
        assert!(c.sensor_capacity > 0);
        assert!((2..=MAX_MENU_ITEMS).contains(&c.menu.len()));
    }

    #[test]
    fn display_refresh_is_faster_than_link_tick() {
        let c = DeviceConfig::default();
        assert!(c.display_refresh_ms < c.link_tick_ms);
    }

    #[test]
    fn provisioning_only_has_no_biometric_item() {
        let c = DeviceConfig::provisioning_only();
        assert!(!c.features.biometrics);
        assert!(!c.menu.contains(&MenuAction::ToggleMatch));
    }

    #[test]
    fn fixed_str_truncates() {
        let s: heapless::String<4> = fixed_str("abcdef");
        assert_eq!(s.as_str(), "abcd");
    }

    #[test]
    fn postcard_roundtrip() {
        let c = DeviceConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: DeviceConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }
}
