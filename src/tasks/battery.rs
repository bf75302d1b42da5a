//! Battery monitor task.
//!
//! ```text
//!   wake ─▶ settle (≥1 s) ─▶ read % + alert ─▶ sleep ─▶ idle (~10 s) ─┐
//!     ▲                                                               │
//!     └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Never terminates.  A failed read is logged and the previous values stay
//! on the board.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::app::ports::BatteryGauge;
use crate::config::DeviceConfig;
use crate::state::StatusBoard;
use crate::tasks::CancelToken;

pub struct BatteryMonitor<G> {
    gauge: G,
    board: Arc<StatusBoard>,
    settle: Duration,
    idle: Duration,
}

impl<G: BatteryGauge> BatteryMonitor<G> {
    pub fn new(gauge: G, board: Arc<StatusBoard>, config: &DeviceConfig) -> Self {
        Self {
            gauge,
            board,
            settle: Duration::from_millis(config.battery_settle_ms as u64),
            idle: Duration::from_millis(config.battery_idle_ms as u64),
        }
    }

    /// One wake → read → sleep pass.  `settle` is called with the
    /// stabilisation delay so tests can skip the wait.
    pub fn cycle(&mut self, settle: impl FnOnce(Duration)) {
        if let Err(e) = self.gauge.wake() {
            warn!("Battery: wake failed: {:?}", e);
        }
        settle(self.settle);

        match (self.gauge.state_of_charge(), self.gauge.alert()) {
            (Ok(percent), Ok(low)) => {
                debug!("Battery: {:.1}% (low={})", percent, low);
                self.board.set_battery(percent, low);
            }
            (Err(e), _) | (_, Err(e)) => warn!("Battery: read failed, keeping last value: {:?}", e),
        }

        if let Err(e) = self.gauge.sleep() {
            warn!("Battery: sleep failed: {:?}", e);
        }
    }

    /// Task body.  Returns only when `cancel` fires (never, in firmware).
    pub fn run(mut self, cancel: &CancelToken) {
        loop {
            let mut cancelled = false;
            self.cycle(|d| cancelled = !cancel.sleep(d));
            if cancelled || !cancel.sleep(self.idle) {
                return;
            }
        }
    }

    pub fn gauge(&self) -> &G {
        &self.gauge
    }
}
