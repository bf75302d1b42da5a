//! Mock peripherals for integration tests.
//!
//! Every mock is a cheap clonable handle over shared state, so a test can
//! move one clone into a task thread and keep another to script inputs and
//! assert on what the task did.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use attendo::app::commands::Command;
use attendo::app::dispatcher::Dispatcher;
use attendo::app::ports::{CharBuffer, FingerprintSensor, MatchResult, SocketEvent, SocketTransport};
use attendo::biometric::SensorLock;
use attendo::config::DeviceConfig;
use attendo::error::{SensorFault, SessionError};
use attendo::events::CommandQueue;
use attendo::runtime::ThreadLauncher;
use attendo::session::outbox::EventOutbox;
use attendo::state::StatusBoard;

// ── Fingerprint sensor ────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SensorScript {
    /// Consumed one per `capture`; an empty script reads as no finger.
    pub captures: VecDeque<Result<(), SensorFault>>,
    /// Consumed one per `search`; an empty script reads as no match.
    pub searches: VecDeque<Result<MatchResult, SensorFault>>,
    pub converted: Vec<CharBuffer>,
    pub merges: usize,
    pub stored: Vec<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct MockSensor {
    script: Arc<Mutex<SensorScript>>,
}

#[allow(dead_code)]
impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, SensorScript> {
        self.script.lock().unwrap()
    }

    /// Touch, lift, touch: what a cooperative user does during enrollment.
    pub fn expect_enrollment(&self) {
        self.script()
            .captures
            .extend([Ok(()), Err(SensorFault::NoFinger), Ok(())]);
    }

    /// One finger on the window that searches to `id` with `confidence`.
    pub fn present(&self, id: u16, confidence: u16) {
        let mut s = self.script();
        s.captures.push_back(Ok(()));
        s.searches.push_back(Ok(MatchResult { id, confidence }));
    }
}

impl FingerprintSensor for MockSensor {
    fn capture(&mut self) -> Result<(), SensorFault> {
        self.script().captures.pop_front().unwrap_or(Err(SensorFault::NoFinger))
    }

    fn convert(&mut self, buffer: CharBuffer) -> Result<(), SensorFault> {
        self.script().converted.push(buffer);
        Ok(())
    }

    fn search(&mut self) -> Result<MatchResult, SensorFault> {
        self.script().searches.pop_front().unwrap_or(Err(SensorFault::NotFound))
    }

    fn merge(&mut self) -> Result<(), SensorFault> {
        self.script().merges += 1;
        Ok(())
    }

    fn store(&mut self, id: u16) -> Result<(), SensorFault> {
        self.script().stored.push(id);
        Ok(())
    }
}

// ── Collector socket ──────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SocketLog {
    pub refuse: bool,
    pub connected: bool,
    pub connects: usize,
    pub inbound: VecDeque<SocketEvent>,
    pub sent: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockSocket {
    log: Arc<Mutex<SocketLog>>,
}

#[allow(dead_code)]
impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, SocketLog> {
        self.log.lock().unwrap()
    }

    /// Queue a text frame as if the collector had sent it.
    pub fn inject(&self, frame: &str) {
        self.log().inbound.push_back(SocketEvent::Text(frame.to_owned()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.log().sent.clone()
    }
}

impl SocketTransport for MockSocket {
    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), SessionError> {
        let mut log = self.log();
        if log.refuse {
            return Err(SessionError::ConnectFailed);
        }
        log.connected = true;
        log.connects += 1;
        log.inbound.push_back(SocketEvent::Connected);
        Ok(())
    }

    fn close(&mut self) {
        self.log().connected = false;
    }

    fn send_text(&mut self, frame: &str) -> Result<(), SessionError> {
        let mut log = self.log();
        if !log.connected {
            return Err(SessionError::NotConnected);
        }
        log.sent.push(frame.to_owned());
        Ok(())
    }

    fn poll(&mut self) -> Option<SocketEvent> {
        self.log().inbound.pop_front()
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Task threads need a `'static` queue; one leaked queue per test keeps
/// tests independent of the firmware's global.
pub fn leaked_queue() -> &'static CommandQueue {
    Box::leak(Box::new(CommandQueue::new()))
}

/// Poll `cond` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[allow(dead_code)]
pub fn no_wait(_: Duration) -> bool {
    true
}

// ── Full terminal ─────────────────────────────────────────────

pub type Connector = Box<dyn FnMut() -> MockSocket + Send>;
pub type TestLauncher = ThreadLauncher<MockSensor, MockSocket, Connector>;

/// Dispatcher, launcher and shared state wired the way `main` wires them,
/// with mocks in place of the sensor and the socket.
pub struct Terminal {
    pub board: Arc<StatusBoard>,
    pub outbox: Arc<EventOutbox>,
    pub queue: &'static CommandQueue,
    pub dispatcher: Dispatcher<TestLauncher>,
    pub sensor: MockSensor,
    pub socket: MockSocket,
}

#[allow(dead_code)]
impl Terminal {
    pub fn new(config: &DeviceConfig) -> Self {
        let board = Arc::new(StatusBoard::new(config.menu.len()));
        let sensor = MockSensor::new();
        let lock = config
            .features
            .biometrics
            .then(|| Arc::new(SensorLock::new(sensor.clone(), board.clone())));
        let outbox = Arc::new(EventOutbox::new(board.clone()));
        let queue = leaked_queue();
        let socket = MockSocket::new();
        let connector: Connector = {
            let socket = socket.clone();
            Box::new(move || socket.clone())
        };
        let launcher = ThreadLauncher::new(lock, connector, board.clone(), outbox.clone(), queue, config);
        let dispatcher = Dispatcher::new(launcher, board.clone(), config);
        Self {
            board,
            outbox,
            queue,
            dispatcher,
            sensor,
            socket,
        }
    }

    /// Move the cursor to `slot` and press select.
    pub fn select_slot(&mut self, slot: usize) {
        while self.board.selected() != slot {
            self.dispatcher.handle(Command::Advance);
        }
        self.dispatcher.handle(Command::Select);
    }

    /// Bring the link up and start a session.
    pub fn connect(&mut self) {
        self.board.set_link_up(true);
        self.select_slot(0);
        assert!(wait_until(TIMEOUT, || self.board.snapshot().session_up), "session never came up");
    }

    /// Pump the dispatcher until `cond` holds.
    pub fn pump_until(&mut self, mut cond: impl FnMut(&mut Self) -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            self.dispatcher.drain(self.queue);
            if cond(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Default configuration with fast sensor and session polling.
pub fn fast_config() -> DeviceConfig {
    DeviceConfig {
        session_poll_ms: 5,
        sensor_backoff_ms: 5,
        lift_timeout_ms: 1000,
        sample_timeout_ms: 1000,
        ..DeviceConfig::default()
    }
}
