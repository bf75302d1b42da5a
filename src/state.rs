//! Shared status board.
//!
//! Every task publishes into one [`StatusBoard`] and the display (and any
//! other reader) takes a cloned [`StatusSnapshot`].  Each setter touches one
//! logical field group under the lock, so a reader never sees half of an
//! update.  Readers are eventually consistent: last writer wins.
//!
//! ```text
//!   battery ─┐                       ┌─▶ display refresh
//!   wifi    ─┤                       │
//!   session ─┼──▶  Mutex<Snapshot> ──┼─▶ dispatcher (cursor, toggles)
//!   sensor  ─┤                       │
//!   menu    ─┘                       └─▶ biometric precondition checks
//! ```

use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::warn;

use crate::config::{MAX_MENU_ITEMS, fixed_str};
use crate::menu;

/// Columns of status text kept per menu slot.
pub const STATUS_COLS: usize = 12;
/// Columns kept for the activity line.
pub const ACTIVITY_COLS: usize = 32;

pub type StatusText = heapless::String<STATUS_COLS>;
pub type ActivityText = heapless::String<ACTIVITY_COLS>;

/// Point-in-time copy of everything on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    // ── Battery ──────────────────────────────────────────────
    pub battery_percent: f32,
    pub battery_low: bool,

    // ── Connection ───────────────────────────────────────────
    pub link_up: bool,
    /// Association in progress.
    pub connecting: bool,
    pub session_up: bool,
    pub provisioning: bool,
    pub ap_address: Option<Ipv4Addr>,
    /// Set by the reset menu item, consumed by the connectivity task.
    pub provisioning_requested: bool,

    // ── Sensor ───────────────────────────────────────────────
    pub sensor_busy: bool,

    // ── Menu ─────────────────────────────────────────────────
    pub menu_len: usize,
    pub selected: usize,
    pub item_status: heapless::Vec<StatusText, MAX_MENU_ITEMS>,
    pub activity: ActivityText,
}

impl StatusSnapshot {
    fn new(menu_len: usize) -> Self {
        let menu_len = menu_len.min(MAX_MENU_ITEMS);
        let mut item_status = heapless::Vec::new();
        for _ in 0..menu_len {
            let _ = item_status.push(StatusText::new());
        }
        Self {
            battery_percent: 0.0,
            battery_low: false,
            link_up: false,
            connecting: false,
            session_up: false,
            provisioning: false,
            ap_address: None,
            provisioning_requested: false,
            sensor_busy: false,
            menu_len,
            selected: 0,
            item_status,
            activity: ActivityText::new(),
        }
    }
}

/// The single shared state store.
pub struct StatusBoard {
    inner: Mutex<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new(menu_len: usize) -> Self {
        Self {
            inner: Mutex::new(StatusSnapshot::new(menu_len)),
        }
    }

    // A panicking writer cannot leave a group half-written (each setter is a
    // handful of plain stores), so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    // ── Battery ──────────────────────────────────────────────

    pub fn set_battery(&self, percent: f32, low: bool) {
        let mut s = self.lock();
        s.battery_percent = percent.clamp(0.0, 100.0);
        s.battery_low = low;
    }

    // ── Connection ───────────────────────────────────────────

    /// Record link state.  Ends any association in progress; dropping the
    /// link drops the session in the same write.
    pub fn set_link_up(&self, up: bool) {
        let mut s = self.lock();
        s.link_up = up;
        s.connecting = false;
        if !up {
            s.session_up = false;
        }
    }

    /// Mark an association attempt as started or abandoned.
    pub fn set_connecting(&self, connecting: bool) {
        self.lock().connecting = connecting;
    }

    /// Record session state.  Returns `false` (and leaves the flag clear) when
    /// asked to mark a session up while the link is down.
    pub fn set_session_up(&self, up: bool) -> bool {
        let mut s = self.lock();
        if up && !s.link_up {
            warn!("Board: refusing session_up without link");
            s.session_up = false;
            return false;
        }
        s.session_up = up;
        true
    }

    /// Enter (`Some(address)`) or leave (`None`) access-point mode.
    pub fn set_provisioning(&self, ap_address: Option<Ipv4Addr>) {
        let mut s = self.lock();
        s.provisioning = ap_address.is_some();
        s.ap_address = ap_address;
    }

    /// Ask the connectivity task to forget credentials and re-provision.
    pub fn request_provisioning(&self) {
        self.lock().provisioning_requested = true;
    }

    /// Consume a pending provisioning request.
    pub fn take_provisioning_request(&self) -> bool {
        let mut s = self.lock();
        core::mem::take(&mut s.provisioning_requested)
    }

    // ── Sensor ───────────────────────────────────────────────

    pub fn set_sensor_busy(&self, busy: bool) {
        self.lock().sensor_busy = busy;
    }

    // ── Menu ─────────────────────────────────────────────────

    /// Move the cursor one slot (wrapping) and return the new index.
    pub fn advance_cursor(&self) -> usize {
        let mut s = self.lock();
        s.selected = menu::advance(s.selected, s.menu_len);
        s.selected
    }

    pub fn selected(&self) -> usize {
        self.lock().selected
    }

    /// Replace the status text of one menu slot.  Out-of-range slots are
    /// ignored.
    pub fn set_item_status(&self, slot: usize, text: &str) {
        let mut s = self.lock();
        if let Some(status) = s.item_status.get_mut(slot) {
            *status = fixed_str(text);
        }
    }

    pub fn set_activity(&self, text: &str) {
        self.lock().activity = fixed_str(text);
    }
}
