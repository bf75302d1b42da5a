//! Command dispatcher: the only place tasks are started or stopped.
//!
//! ```text
//!  button ISR ──┐
//!               ├──▶ CommandQueue ──▶ Dispatcher ──▶ Launcher ──▶ threads
//!  session   ───┘                          │
//!                                          └──▶ StatusBoard (cursor, slot text)
//! ```
//!
//! The dispatcher owns the [`TaskHandle`] of every started task.  Finished
//! tasks are reaped at the start of every pass, so a toggle always acts on
//! what is actually running rather than on what was last requested.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::{DeviceConfig, MAX_MENU_ITEMS};
use crate::error::Error;
use crate::events::CommandQueue;
use crate::menu::MenuAction;
use crate::state::StatusBoard;
use crate::tasks::{CancelToken, TaskHandle};

use super::commands::Command;

/// Starts the started/stopped tasks.  Implementations take whatever they
/// need (sensor claim, socket, outbox) and hand back a running task.
pub trait Launcher {
    fn start_session(&mut self) -> Result<TaskHandle, Error>;

    /// Fails with [`Error::SensorBusy`] when the sensor is claimed.
    fn start_match(&mut self) -> Result<TaskHandle, Error>;

    /// Fails with [`Error::SensorBusy`] when the sensor is claimed.
    fn start_enroll(&mut self, id: u16) -> Result<TaskHandle, Error>;
}

pub struct Dispatcher<L> {
    launcher: L,
    board: Arc<StatusBoard>,
    menu: heapless::Vec<MenuAction, MAX_MENU_ITEMS>,
    sensor_capacity: u16,
    session: Option<TaskHandle>,
    matcher: Option<TaskHandle>,
    enroller: Option<TaskHandle>,
}

impl<L: Launcher> Dispatcher<L> {
    pub fn new(launcher: L, board: Arc<StatusBoard>, config: &DeviceConfig) -> Self {
        let dispatcher = Self {
            launcher,
            board,
            menu: config.menu.clone(),
            sensor_capacity: config.sensor_capacity,
            session: None,
            matcher: None,
            enroller: None,
        };
        dispatcher.publish_status();
        dispatcher
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    pub fn menu(&self) -> &[MenuAction] {
        &self.menu
    }

    pub fn session_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn match_running(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn enroll_running(&self) -> bool {
        self.enroller.is_some()
    }

    /// Handle every queued command.
    pub fn drain(&mut self, queue: &CommandQueue) {
        self.reap();
        queue.drain(|command| self.handle(command));
    }

    pub fn handle(&mut self, command: Command) {
        self.reap();
        match command {
            Command::Advance => {
                let selected = self.board.advance_cursor();
                info!("Menu: cursor at {}", selected);
            }
            Command::Select => {
                let selected = self.board.selected();
                match self.menu.get(selected).copied() {
                    Some(action) => self.select(action),
                    None => warn!("Menu: no item at slot {}", selected),
                }
            }
            Command::Enroll { id } => self.enroll(id),
        }
        self.publish_status();
    }

    /// Drop handles of tasks whose bodies have returned.
    pub fn reap(&mut self) {
        let mut changed = false;
        for slot in [&mut self.session, &mut self.matcher, &mut self.enroller] {
            if slot.as_ref().is_some_and(TaskHandle::is_finished) {
                if let Some(handle) = slot.take() {
                    info!("Dispatcher: '{}' finished", handle.name());
                    handle.stop();
                    changed = true;
                }
            }
        }
        if changed {
            self.publish_status();
        }
    }

    /// Dispatcher loop.  `after_pass` runs once per pass after the queue is
    /// drained (button rearm, watchdog feed).  Returns when `cancel` fires.
    pub fn run(mut self, queue: &CommandQueue, poll: Duration, cancel: &CancelToken, mut after_pass: impl FnMut()) {
        info!("Dispatcher: running ({} menu items)", self.menu.len());
        loop {
            self.drain(queue);
            after_pass();
            if !cancel.sleep(poll) {
                break;
            }
        }
        for handle in [self.session.take(), self.matcher.take(), self.enroller.take()].into_iter().flatten() {
            handle.stop();
        }
    }

    fn select(&mut self, action: MenuAction) {
        info!("Menu: {}", action.label());
        match action {
            MenuAction::ToggleSession => match self.session.take() {
                Some(handle) => handle.stop(),
                None => self.session = self.launch("session", |l| l.start_session()),
            },
            MenuAction::ToggleMatch => match self.matcher.take() {
                Some(handle) => handle.stop(),
                None => self.matcher = self.launch("match", |l| l.start_match()),
            },
            MenuAction::ResetWifi => {
                if let Some(handle) = self.session.take() {
                    handle.stop();
                }
                self.board.request_provisioning();
                self.board.set_activity("WiFi reset");
            }
            MenuAction::Sleep => self.board.set_activity("Sleep not available"),
        }
    }

    fn enroll(&mut self, id: u16) {
        if id >= self.sensor_capacity {
            warn!("Dispatcher: enroll id {} outside 0..{}", id, self.sensor_capacity);
            self.board.set_activity(&format!("Bad enroll id {id}"));
            return;
        }
        if self.enroller.is_some() {
            warn!("Dispatcher: enroll {} rejected, enrollment in progress", id);
            return;
        }
        if let Some(handle) = self.matcher.take() {
            info!("Dispatcher: stopping match for enroll {}", id);
            handle.stop();
        }
        self.enroller = self.launch("enroll", |l| l.start_enroll(id));
    }

    fn launch(
        &mut self,
        what: &str,
        start: impl FnOnce(&mut L) -> Result<TaskHandle, Error>,
    ) -> Option<TaskHandle> {
        match start(&mut self.launcher) {
            Ok(handle) => Some(handle),
            Err(Error::SensorBusy) => {
                warn!("Dispatcher: {} refused, sensor busy", what);
                self.board.set_activity("Sensor busy");
                None
            }
            Err(e) => {
                warn!("Dispatcher: {} failed to start: {}", what, e);
                None
            }
        }
    }

    fn publish_status(&self) {
        for (slot, action) in self.menu.iter().enumerate() {
            let running = match action {
                MenuAction::ToggleSession => Some(self.session.is_some()),
                MenuAction::ToggleMatch => Some(self.matcher.is_some()),
                MenuAction::ResetWifi | MenuAction::Sleep => None,
            };
            let text = match running {
                Some(true) => "On",
                Some(false) => "Off",
                None => "",
            };
            self.board.set_item_status(slot, text);
        }
    }
}
