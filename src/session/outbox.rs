//! Hand-off of fingerprint events from the biometric workflows to the
//! session task.
//!
//! Events are only accepted while the board says a session is up, and
//! whatever is still queued when the session stops is thrown away, so no
//! event ever crosses from one session into the next.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::events::FingerprintEvent;
use crate::state::StatusBoard;

const OUTBOX_DEPTH: usize = 8;

pub struct EventOutbox {
    board: Arc<StatusBoard>,
    queue: Channel<CriticalSectionRawMutex, FingerprintEvent, OUTBOX_DEPTH>,
}

impl EventOutbox {
    pub fn new(board: Arc<StatusBoard>) -> Self {
        Self {
            board,
            queue: Channel::new(),
        }
    }

    /// Queue an event for the running session.  Returns `false` when it was
    /// dropped (no session, or outbox full).
    pub fn publish(&self, event: FingerprintEvent) -> bool {
        if !self.board.snapshot().session_up {
            debug!("Outbox: no session, dropping {:?}", event);
            return false;
        }
        if self.queue.try_send(event).is_err() {
            warn!("Outbox: full, dropping {:?}", event);
            return false;
        }
        true
    }

    /// Next queued event, oldest first.
    pub fn take(&self) -> Option<FingerprintEvent> {
        self.queue.try_receive().ok()
    }

    /// Discard everything queued.
    pub fn clear(&self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
