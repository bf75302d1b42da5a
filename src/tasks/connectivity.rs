//! Connectivity task: keeps the station link up, or provisions it.
//!
//! ```text
//!                 creds ok, link up
//!  Disconnected ──▶ Connecting ──────────▶ Connected
//!     ▲   │             │ attempts exhausted    │ link lost
//!     │   │ no creds    ▼ (AP fallback on)      │
//!     │   └────────▶ Provisioning ◀─────────────┼── reset request
//!     │                 │ /save persisted       │
//!     └─────────────────┴───────────────────────┘
//! ```
//!
//! The access point and its HTTP server are torn down right after a
//! successful save (after a short grace so the confirmation page reaches
//! the browser), before the next association attempt.
//!
//! The `wait` closure handed to [`ConnectivityTask::tick`] is the task's
//! only yield point.  It runs between association polls and, with a zero
//! duration, before every blocking radio call (scan, AP start), so a
//! caller that feeds the watchdog inside it never starves it.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::{LinkPort, ProvisioningPort, StoragePort};
use crate::config::DeviceConfig;
use crate::drivers::watchdog::Watchdog;
use crate::provisioning::credentials::{self, Credentials};
use crate::provisioning::portal;
use crate::state::StatusBoard;
use crate::tasks::CancelToken;

/// Poll interval while serving the portal.
const PORTAL_POLL: Duration = Duration::from_millis(50);
/// Time the confirmation page gets before the access point goes down.
pub const AP_TEARDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Provisioning,
}

pub struct ConnectivityTask<W, S> {
    radio: W,
    storage: S,
    board: Arc<StatusBoard>,
    state: ConnState,
    attempts: u8,
    retry: Duration,
    tick_interval: Duration,
    ap_fallback: bool,
    ap_ssid: heapless::String<32>,
    ap_password: heapless::String<64>,
    networks: Vec<String>,
}

impl<W: LinkPort + ProvisioningPort, S: StoragePort> ConnectivityTask<W, S> {
    pub fn new(radio: W, storage: S, board: Arc<StatusBoard>, config: &DeviceConfig) -> Self {
        Self {
            radio,
            storage,
            board,
            state: ConnState::Disconnected,
            attempts: config.link_attempts,
            retry: config.link_retry(),
            tick_interval: config.link_tick(),
            ap_fallback: config.features.provisioning_ap,
            ap_ssid: config.ap_ssid.clone(),
            ap_password: config.ap_password.clone(),
            networks: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn radio(&self) -> &W {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut W {
        &mut self.radio
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// One pass of the state machine.  `wait` sleeps between association
    /// polls and returns `false` if the task was cancelled meanwhile.
    pub fn tick(&mut self, wait: &mut impl FnMut(Duration) -> bool) -> ConnState {
        if self.board.take_provisioning_request() {
            info!("WiFi: reset requested, forgetting credentials");
            if let Err(e) = credentials::forget(&mut self.storage) {
                warn!("WiFi: could not delete credentials: {}", e);
            }
            if self.state != ConnState::Provisioning {
                self.enter_provisioning(wait);
            }
            return self.state;
        }

        match self.state {
            ConnState::Connected => {
                if !self.radio.is_up() {
                    warn!("WiFi: link lost");
                    self.board.set_link_up(false);
                    self.state = ConnState::Disconnected;
                }
            }
            ConnState::Disconnected | ConnState::Connecting => match credentials::load(&self.storage) {
                Ok(Some(creds)) => self.associate(&creds, wait),
                Ok(None) => {
                    info!("WiFi: no usable credentials");
                    self.enter_provisioning(wait);
                }
                Err(e) => {
                    warn!("WiFi: credential read failed: {}", e);
                    self.state = ConnState::Disconnected;
                }
            },
            ConnState::Provisioning => self.serve_portal(wait),
        }
        self.state
    }

    fn associate(&mut self, creds: &Credentials, wait: &mut impl FnMut(Duration) -> bool) {
        info!("WiFi: connecting to '{}'", creds.ssid);
        self.state = ConnState::Connecting;
        self.board.set_connecting(true);

        let started = match self.radio.begin(creds) {
            Ok(()) => true,
            Err(e) => {
                warn!("WiFi: association failed to start: {}", e);
                false
            }
        };

        if started {
            for _ in 0..self.attempts {
                if self.radio.is_up() {
                    info!("WiFi: connected to '{}'", creds.ssid);
                    self.board.set_link_up(true);
                    self.state = ConnState::Connected;
                    return;
                }
                if !wait(self.retry) {
                    // Cancelled mid-attempt; retry from scratch next time.
                    self.radio.disconnect();
                    self.board.set_connecting(false);
                    self.state = ConnState::Disconnected;
                    return;
                }
            }
            if self.radio.is_up() {
                self.board.set_link_up(true);
                self.state = ConnState::Connected;
                return;
            }
        }

        warn!("WiFi: '{}' unreachable after {} attempts", creds.ssid, self.attempts);
        self.radio.disconnect();
        self.board.set_connecting(false);
        if self.ap_fallback {
            self.enter_provisioning(wait);
        } else {
            self.state = ConnState::Disconnected;
        }
    }

    fn enter_provisioning(&mut self, wait: &mut impl FnMut(Duration) -> bool) {
        self.board.set_link_up(false);
        self.radio.disconnect();
        if !wait(Duration::ZERO) {
            self.state = ConnState::Disconnected;
            return;
        }
        self.rescan();

        if !wait(Duration::ZERO) {
            self.state = ConnState::Disconnected;
            return;
        }
        match self.radio.start_access_point(&self.ap_ssid, &self.ap_password) {
            Ok(ip) => {
                info!("WiFi: access point '{}' up at {}", self.ap_ssid, ip);
                self.board.set_provisioning(Some(ip));
                self.state = ConnState::Provisioning;
            }
            Err(e) => {
                warn!("WiFi: {}", e);
                self.state = ConnState::Disconnected;
            }
        }
    }

    fn rescan(&mut self) {
        self.networks = self.radio.scan_networks();
        info!("WiFi: {} networks visible", self.networks.len());
    }

    fn serve_portal(&mut self, wait: &mut impl FnMut(Duration) -> bool) {
        while let Some(request) = self.radio.next_request() {
            if portal::is_form_request(&request) {
                let _ = wait(Duration::ZERO);
                self.rescan();
            }
            let (response, saved) = portal::handle(&request, &self.networks, &mut self.storage);
            self.radio.respond(response);
            if saved.is_some() {
                info!("WiFi: credentials received, leaving AP mode");
                // Cancellation only shortens the grace.
                let _ = wait(AP_TEARDOWN_GRACE);
                self.radio.stop_access_point();
                self.board.set_provisioning(None);
                self.state = ConnState::Disconnected;
                return;
            }
        }
    }

    /// Task body.  The watchdog is fed on every pass and at every yield
    /// point inside a pass.
    pub fn run(mut self, cancel: &CancelToken, watchdog: &Watchdog) {
        loop {
            watchdog.feed();
            let state = self.tick(&mut |d| {
                watchdog.feed();
                cancel.sleep(d)
            });
            let pause = if state == ConnState::Provisioning { PORTAL_POLL } else { self.tick_interval };
            if !cancel.sleep(pause) {
                return;
            }
        }
    }
}
