//! Long-running tasks and the cooperative cancellation they share.
//!
//! | Task           | Lifetime              | Writes to the board          |
//! |----------------|-----------------------|------------------------------|
//! | `battery`      | forever               | battery %, low alert         |
//! | `connectivity` | forever               | link, provisioning, AP addr  |
//! | `display`      | forever               | nothing (pure reader)        |
//! | session        | started/stopped       | session flag, slot status    |
//! | match / enroll | started/stopped       | sensor flag, activity line   |
//!
//! Started/stopped tasks are never killed: the dispatcher sets their
//! [`CancelToken`] and joins them, and every loop polls the token between
//! steps and sleeps through [`CancelToken::sleep`].

pub mod battery;
pub mod connectivity;
pub mod display;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::warn;

/// Longest uninterrupted nap inside [`CancelToken::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared "please stop" flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` in short slices.  Returns `false` as soon as the
    /// token is cancelled, `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// A started task: its token plus the thread running it.
pub struct TaskHandle {
    name: &'static str,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn new(name: &'static str, cancel: CancelToken, join: JoinHandle<()>) -> Self {
        Self {
            name,
            cancel,
            join: Some(join),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task body has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to return.
    pub fn stop(mut self) {
        self.cancel.cancel();
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("Task '{}' panicked", self.name);
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        // Dropping a handle stops its task.
        self.cancel.cancel();
        self.join_inner();
    }
}
