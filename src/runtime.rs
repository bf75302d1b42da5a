//! Thread-backed [`Launcher`]: turns dispatcher decisions into pinned tasks.
//!
//! Each start creates a fresh [`CancelToken`], moves everything the task
//! body needs into the closure and spawns it with its [`TaskSpec`].  The
//! sensor claim is taken here, on the dispatcher's thread, so a refused
//! claim is reported synchronously and never spawns anything.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::app::dispatcher::Launcher;
use crate::app::ports::{FingerprintSensor, SocketTransport};
use crate::biometric::enroll::{self, EnrollTimings};
use crate::biometric::{SensorLock, matcher};
use crate::config::DeviceConfig;
use crate::drivers::task_pin::{self, ENROLL_TASK, MATCH_TASK, SESSION_TASK, TaskSpec};
use crate::error::Error;
use crate::events::CommandQueue;
use crate::session::outbox::EventOutbox;
use crate::session::{self, SessionClient};
use crate::state::StatusBoard;
use crate::tasks::{CancelToken, TaskHandle};

pub struct ThreadLauncher<S, T, F> {
    sensor: Option<Arc<SensorLock<S>>>,
    connect: F,
    board: Arc<StatusBoard>,
    outbox: Arc<EventOutbox>,
    commands: &'static CommandQueue,
    host: heapless::String<64>,
    port: u16,
    session_poll: Duration,
    threshold: u16,
    backoff: Duration,
    timings: EnrollTimings,
    _socket: PhantomData<fn() -> T>,
}

impl<S, T, F> ThreadLauncher<S, T, F>
where
    S: FingerprintSensor + Send + 'static,
    T: SocketTransport + Send + 'static,
    F: FnMut() -> T,
{
    /// `sensor` is `None` on boards without biometrics; `connect` builds a
    /// fresh socket for every session.
    pub fn new(
        sensor: Option<Arc<SensorLock<S>>>,
        connect: F,
        board: Arc<StatusBoard>,
        outbox: Arc<EventOutbox>,
        commands: &'static CommandQueue,
        config: &DeviceConfig,
    ) -> Self {
        Self {
            sensor,
            connect,
            board,
            outbox,
            commands,
            host: config.server_host.clone(),
            port: config.server_port,
            session_poll: Duration::from_millis(config.session_poll_ms as u64),
            threshold: config.match_threshold,
            backoff: config.sensor_backoff(),
            timings: EnrollTimings::from_config(config),
            _socket: PhantomData,
        }
    }

    fn sensor(&self) -> Result<&Arc<SensorLock<S>>, Error> {
        self.sensor.as_ref().ok_or(Error::Init("no fingerprint sensor"))
    }
}

fn spawn(spec: TaskSpec, label: &'static str, body: impl FnOnce(CancelToken) + Send + 'static) -> Result<TaskHandle, Error> {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let join = task_pin::spawn_on_core(spec, move || body(token)).map_err(|e| {
        log::error!("Runtime: spawning {} failed: {}", label, e);
        Error::Spawn(label)
    })?;
    Ok(TaskHandle::new(label, cancel, join))
}

impl<S, T, F> Launcher for ThreadLauncher<S, T, F>
where
    S: FingerprintSensor + Send + 'static,
    T: SocketTransport + Send + 'static,
    F: FnMut() -> T,
{
    fn start_session(&mut self) -> Result<TaskHandle, Error> {
        let client = SessionClient::new((self.connect)(), self.board.clone(), self.outbox.clone());
        let host = self.host.clone();
        let port = self.port;
        let poll = self.session_poll;
        let commands = self.commands;
        spawn(SESSION_TASK, "session", move |cancel| {
            session::run_session(client, &host, port, commands, &cancel, poll);
        })
    }

    fn start_match(&mut self) -> Result<TaskHandle, Error> {
        let claim = self.sensor()?.try_claim().ok_or(Error::SensorBusy)?;
        let outbox = self.outbox.clone();
        let threshold = self.threshold;
        let backoff = self.backoff;
        spawn(MATCH_TASK, "match", move |cancel| {
            matcher::run_match(claim, outbox, threshold, backoff, &cancel);
        })
    }

    fn start_enroll(&mut self, id: u16) -> Result<TaskHandle, Error> {
        let claim = self.sensor()?.try_claim().ok_or(Error::SensorBusy)?;
        let outbox = self.outbox.clone();
        let timings = self.timings;
        spawn(ENROLL_TASK, "enroll", move |cancel| {
            enroll::run_enroll(claim, id, timings, outbox, &cancel);
        })
    }
}
