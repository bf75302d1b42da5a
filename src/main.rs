//! Attendo Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Max17043    Ssd1306     R307          NvsAdapter              │
//! │  (Gauge)     (Display)   (Fingerprint) (Config+Storage)        │
//! │  WifiRadio                WebSocketTransport                   │
//! │  (Link+Provisioning)      (Socket)                             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  battery · connectivity · display          (forever tasks)     │
//! │  Dispatcher ──▶ session · match · enroll   (started/stopped)   │
//! │  StatusBoard · CommandQueue · EventOutbox  (shared state)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use attendo::adapters::nvs::NvsAdapter;
use attendo::adapters::websocket::WebSocketTransport;
use attendo::adapters::wifi::WifiRadio;
use attendo::app::dispatcher::Dispatcher;
use attendo::app::ports::ConfigPort;
use attendo::biometric::SensorLock;
use attendo::config::DeviceConfig;
use attendo::drivers::hw_init;
use attendo::drivers::task_pin::{BATTERY_TASK, CONNECTIVITY_TASK, DISPATCHER_TASK, DISPLAY_TASK, spawn_on_core};
use attendo::drivers::watchdog::Watchdog;
use attendo::error::Error;
use attendo::events::COMMANDS;
use attendo::runtime::ThreadLauncher;
use attendo::session::outbox::EventOutbox;
use attendo::state::StatusBoard;
use attendo::tasks::CancelToken;
use attendo::tasks::battery::BatteryMonitor;
use attendo::tasks::connectivity::ConnectivityTask;
use attendo::tasks::display::DisplayTask;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Attendo v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    // ── 3. Bring up the board ─────────────────────────────────
    let hw = match hw_init::bring_up(&config) {
        Ok(hw) => hw,
        Err(e) => {
            error!("Boot: {}, halting", e);
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    // ── 4. Shared state ───────────────────────────────────────
    let board = Arc::new(StatusBoard::new(config.menu.len()));
    let outbox = Arc::new(EventOutbox::new(board.clone()));
    let sensor = hw.sensor.map(|s| Arc::new(SensorLock::new(s, board.clone())));

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let radio = WifiRadio::new(hw.modem, sys_loop, nvs_partition).map_err(Error::from)?;

    // ── 5. Forever tasks ──────────────────────────────────────
    let forever = CancelToken::new();
    let mut joins = Vec::new();

    let battery = BatteryMonitor::new(hw.gauge, board.clone(), &config);
    let cancel = forever.clone();
    joins.push(spawn_on_core(BATTERY_TASK, move || battery.run(&cancel))?);

    let connectivity = ConnectivityTask::new(radio, nvs, board.clone(), &config);
    let cancel = forever.clone();
    joins.push(spawn_on_core(CONNECTIVITY_TASK, move || {
        let watchdog = Watchdog::subscribe("connectivity");
        connectivity.run(&cancel, &watchdog);
    })?);

    let display = DisplayTask::new(hw.display, board.clone(), &config);
    let cancel = forever.clone();
    joins.push(spawn_on_core(DISPLAY_TASK, move || display.run(&cancel))?);

    // ── 6. Dispatcher ─────────────────────────────────────────
    let launcher = ThreadLauncher::new(sensor, WebSocketTransport::new, board.clone(), outbox, &COMMANDS, &config);
    let dispatcher = Dispatcher::new(launcher, board, &config);
    let poll = Duration::from_millis(config.dispatcher_poll_ms as u64);
    let mut buttons = hw.buttons;
    let cancel = forever.clone();
    joins.push(spawn_on_core(DISPATCHER_TASK, move || {
        let watchdog = Watchdog::subscribe("dispatcher");
        dispatcher.run(&COMMANDS, poll, &cancel, || {
            buttons.rearm();
            watchdog.feed();
        });
    })?);

    info!("System ready");
    for join in joins {
        if join.join().is_err() {
            error!("A forever task panicked");
        }
    }
    Ok(())
}
