//! Session client: the one socket to the remote collector.
//!
//! ```text
//!   Match / Enroll ──▶ EventOutbox ──▶ SessionClient ──▶ SocketTransport
//!                                           │
//!   Dispatcher ◀── CommandQueue ◀── enroll ─┘ (rate limited)
//! ```
//!
//! Started and stopped by the dispatcher.  The loop in [`run_session`]
//! ends on its own when the link drops or the socket reports a disconnect;
//! stopping always closes the socket, clears `session_up` and discards any
//! queued outbound events.

pub mod outbox;
pub mod protocol;

use std::sync::Arc;
use std::time::Duration;

use burster::Limiter;
use log::{debug, info, warn};

use crate::adapters::time::monotonic;
use crate::app::commands::Command;
use crate::app::events::{FingerprintEvent, InboundCommand};
use crate::app::ports::{SocketEvent, SocketTransport};
use crate::error::SessionError;
use crate::events::CommandQueue;
use crate::state::StatusBoard;
use crate::tasks::CancelToken;

use self::outbox::EventOutbox;
use self::protocol::DecodeError;

/// Inbound frames per second (and burst size) accepted from the collector.
const INBOUND_FRAMES_PER_SEC: u64 = 4;

pub struct SessionClient<T> {
    transport: T,
    board: Arc<StatusBoard>,
    outbox: Arc<EventOutbox>,
    limiter: burster::TokenBucket<fn() -> Duration>,
    running: bool,
}

impl<T: SocketTransport> SessionClient<T> {
    pub fn new(transport: T, board: Arc<StatusBoard>, outbox: Arc<EventOutbox>) -> Self {
        Self {
            transport,
            board,
            outbox,
            limiter: burster::TokenBucket::new_with_time_provider(
                INBOUND_FRAMES_PER_SEC,
                INBOUND_FRAMES_PER_SEC,
                monotonic as fn() -> Duration,
            ),
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the socket and mark the session up.  Anything a workflow slipped
    /// into the outbox after the previous session stopped is discarded first.
    pub fn start(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        self.transport.connect(host, port)?;
        self.outbox.clear();
        if !self.board.set_session_up(true) {
            self.transport.close();
            return Err(SessionError::NotConnected);
        }
        self.running = true;
        info!("Session: started ({}:{})", host, port);
        Ok(())
    }

    /// Close the socket, mark the session down and drop pending events.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.transport.close();
        self.board.set_session_up(false);
        self.outbox.clear();
        self.running = false;
        info!("Session: stopped");
    }

    /// Send one event as one text frame.  No retry.
    pub fn send(&mut self, event: &FingerprintEvent) -> Result<(), SessionError> {
        if !self.running {
            return Err(SessionError::NotConnected);
        }
        let frame = protocol::encode_event(event)?;
        self.transport.send_text(&frame)?;
        debug!("Session: sent {}", frame);
        Ok(())
    }

    /// Handle one inbound text frame.
    pub fn on_message(&mut self, frame: &str, commands: &CommandQueue) {
        if self.limiter.try_consume(1).is_err() {
            warn!("Session: inbound rate limit hit, dropping frame");
            return;
        }
        match protocol::decode_command(frame) {
            Ok(InboundCommand::Enroll { id }) => {
                info!("Session: enroll request for id {}", id);
                if !commands.push(Command::Enroll { id }) {
                    warn!("Session: command queue full, enroll {} dropped", id);
                }
            }
            Err(DecodeError::UnknownAction(action)) => debug!("Session: ignoring action '{}'", action),
            Err(e) => warn!("Session: {}: {:?}", e, frame),
        }
    }

    /// Drain socket events, then flush the outbox.  Returns `false` once the
    /// socket has gone away.
    pub fn poll(&mut self, commands: &CommandQueue) -> bool {
        while let Some(event) = self.transport.poll() {
            match event {
                SocketEvent::Connected => info!("Session: socket connected"),
                SocketEvent::Disconnected => {
                    warn!("Session: socket disconnected");
                    return false;
                }
                SocketEvent::Text(frame) => self.on_message(&frame, commands),
            }
        }

        while let Some(event) = self.outbox.take() {
            if let Err(e) = self.send(&event) {
                warn!("Session: {:?} lost: {}", event, e);
            }
        }
        true
    }
}

impl<T> Drop for SessionClient<T> {
    fn drop(&mut self) {
        if self.running {
            self.board.set_session_up(false);
            self.outbox.clear();
        }
    }
}

/// Session task body: start, pump events until cancelled or the link
/// drops, stop.
pub fn run_session<T: SocketTransport>(
    mut client: SessionClient<T>,
    host: &str,
    port: u16,
    commands: &CommandQueue,
    cancel: &CancelToken,
    poll_interval: Duration,
) {
    if let Err(e) = client.start(host, port) {
        warn!("Session: could not start: {}", e);
        client.board.set_activity("Server unreachable");
        return;
    }

    loop {
        if cancel.is_cancelled() {
            break;
        }
        if !client.board.snapshot().link_up {
            info!("Session: link down, ending session");
            break;
        }
        if !client.poll(commands) {
            break;
        }
        if !cancel.sleep(poll_interval) {
            break;
        }
    }

    client.stop();
}
