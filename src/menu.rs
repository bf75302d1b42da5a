//! Menu model: the actions a slot can be bound to and cursor movement.
//!
//! The slot list itself comes from [`DeviceConfig::menu`](crate::config::DeviceConfig),
//! the cursor and per-slot status text live on the
//! [`StatusBoard`](crate::state::StatusBoard).

use serde::{Deserialize, Serialize};

/// What a menu slot does when selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuAction {
    /// Start the remote session if stopped, stop it if running.
    ToggleSession,
    /// Start or stop continuous fingerprint matching.
    ToggleMatch,
    /// Forget stored WiFi credentials and re-enter provisioning.
    ResetWifi,
    /// Put the device to sleep (status text only for now).
    Sleep,
}

impl MenuAction {
    /// Label shown on the panel for this slot.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToggleSession => "Server",
            Self::ToggleMatch => "Attendance",
            Self::ResetWifi => "Reset WiFi",
            Self::Sleep => "Sleep",
        }
    }
}

/// Move the cursor one slot up, wrapping from the first slot to the last.
///
/// A cursor that is somehow past the end is pulled back into range.
pub fn advance(selected: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    match selected {
        0 => len - 1,
        n => (n - 1).min(len - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_below_zero() {
        assert_eq!(advance(0, 3), 2);
        assert_eq!(advance(2, 3), 1);
        assert_eq!(advance(1, 3), 0);
    }

    #[test]
    fn advance_clamps_stale_cursor() {
        assert_eq!(advance(7, 3), 2);
    }

    #[test]
    fn empty_menu_stays_at_zero() {
        assert_eq!(advance(0, 0), 0);
    }
}
