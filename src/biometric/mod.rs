//! Fingerprint workflows and the single-owner sensor claim.
//!
//! Match and Enroll both need the sensor for their whole run.  Rather than
//! trusting callers to take turns, the sensor sits inside a [`SensorLock`]
//! and a workflow may only touch it through a [`SensorClaim`].  At most one
//! claim exists at a time and dropping it (on any exit path, including a
//! panic unwinding through the task) frees the sensor and clears the
//! board's `sensor_busy` flag.

pub mod enroll;
pub mod matcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::state::StatusBoard;

pub struct SensorLock<S> {
    sensor: Mutex<S>,
    claimed: AtomicBool,
    board: Arc<StatusBoard>,
}

impl<S> SensorLock<S> {
    pub fn new(sensor: S, board: Arc<StatusBoard>) -> Self {
        Self {
            sensor: Mutex::new(sensor),
            claimed: AtomicBool::new(false),
            board,
        }
    }

    /// Take exclusive ownership of the sensor, or `None` if a workflow
    /// already holds it.
    pub fn try_claim(self: &Arc<Self>) -> Option<SensorClaim<S>> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.board.set_sensor_busy(true);
        debug!("Sensor: claimed");
        Some(SensorClaim { lock: self.clone() })
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    fn guard(&self) -> MutexGuard<'_, S> {
        self.sensor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of exclusive sensor ownership.
pub struct SensorClaim<S> {
    lock: Arc<SensorLock<S>>,
}

impl<S> SensorClaim<S> {
    pub fn sensor(&self) -> MutexGuard<'_, S> {
        self.lock.guard()
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.lock.board
    }
}

impl<S> Drop for SensorClaim<S> {
    fn drop(&mut self) {
        // Clear the flag first so a new claimant's `true` is never overwritten.
        self.lock.board.set_sensor_busy(false);
        self.lock.claimed.store(false, Ordering::Release);
        debug!("Sensor: released");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_claim_at_a_time() {
        let board = Arc::new(StatusBoard::new(3));
        let lock = Arc::new(SensorLock::new((), board.clone()));

        let first = lock.try_claim().unwrap();
        assert!(board.snapshot().sensor_busy);
        assert!(lock.try_claim().is_none());

        drop(first);
        assert!(!board.snapshot().sensor_busy);
        assert!(!lock.is_claimed());
        assert!(lock.try_claim().is_some());
    }

    #[test]
    fn claim_is_released_when_task_panics() {
        let board = Arc::new(StatusBoard::new(3));
        let lock = Arc::new(SensorLock::new(0u8, board.clone()));
        let claim = lock.try_claim().unwrap();
        let _ = std::thread::spawn(move || {
            let _claim = claim;
            panic!("workflow blew up");
        })
        .join();
        assert!(!lock.is_claimed());
        assert!(!board.snapshot().sensor_busy);
    }
}
