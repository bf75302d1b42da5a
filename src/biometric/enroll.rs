//! One-shot enrollment of a template under a given id.
//!
//! ```text
//!  sample #1 ──▶ wait for lift ──▶ sample #2 ──▶ merge ──▶ store(id) ──▶ confirm
//!  (buffer 1)    (bounded)         (buffer 2)
//! ```
//!
//! Every step is bounded: samples by `sample_timeout`, the lift by
//! `lift_timeout`.  Any abort leaves the library untouched and reports
//! nothing upstream.  Storing under an id that already holds a template
//! overwrites it.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::app::events::FingerprintEvent;
use crate::app::ports::{CharBuffer, FingerprintSensor};
use crate::config::DeviceConfig;
use crate::error::SensorFault;
use crate::session::outbox::EventOutbox;
use crate::state::StatusBoard;
use crate::tasks::CancelToken;

use super::SensorClaim;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollTimings {
    /// Pause between polls of the sensor window.
    pub poll: Duration,
    pub sample_timeout: Duration,
    pub lift_timeout: Duration,
}

impl EnrollTimings {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            poll: config.sensor_backoff(),
            sample_timeout: config.sample_timeout(),
            lift_timeout: config.lift_timeout(),
        }
    }
}

/// Why an enrollment stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollAbort {
    Cancelled,
    /// No usable finger within the sample timeout.
    NoSample,
    /// Finger still on the window when the lift timeout expired.
    NotLifted,
    Sensor(SensorFault),
}

impl core::fmt::Display for EnrollAbort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::NoSample => write!(f, "no finger"),
            Self::NotLifted => write!(f, "finger not lifted"),
            Self::Sensor(e) => write!(f, "{e}"),
        }
    }
}

impl From<SensorFault> for EnrollAbort {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

/// Run the full enrollment against `sensor`.  `wait` sleeps between polls
/// and returns `false` once the caller wants out.
pub fn enroll(
    sensor: &mut impl FingerprintSensor,
    id: u16,
    timings: &EnrollTimings,
    board: &StatusBoard,
    wait: &mut impl FnMut(Duration) -> bool,
) -> Result<(), EnrollAbort> {
    board.set_activity(&format!("Enroll #{id}: place finger"));
    sample(sensor, CharBuffer::One, timings, wait)?;

    board.set_activity("Remove finger");
    wait_for_lift(sensor, timings, wait)?;

    board.set_activity("Place same finger");
    sample(sensor, CharBuffer::Two, timings, wait)?;

    board.set_activity("Merging");
    sensor.merge()?;

    board.set_activity(&format!("Storing #{id}"));
    sensor.store(id)?;
    Ok(())
}

fn sample(
    sensor: &mut impl FingerprintSensor,
    buffer: CharBuffer,
    timings: &EnrollTimings,
    wait: &mut impl FnMut(Duration) -> bool,
) -> Result<(), EnrollAbort> {
    let mut waited = Duration::ZERO;
    loop {
        match sensor.capture() {
            Ok(()) => match sensor.convert(buffer) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("Enroll: sample {:?} unusable: {}", buffer, e),
            },
            Err(e) if e.is_transient() => {}
            Err(e) => return Err(e.into()),
        }
        if waited >= timings.sample_timeout {
            return Err(EnrollAbort::NoSample);
        }
        if !wait(timings.poll) {
            return Err(EnrollAbort::Cancelled);
        }
        waited += timings.poll;
    }
}

fn wait_for_lift(
    sensor: &mut impl FingerprintSensor,
    timings: &EnrollTimings,
    wait: &mut impl FnMut(Duration) -> bool,
) -> Result<(), EnrollAbort> {
    let mut waited = Duration::ZERO;
    loop {
        if sensor.capture() == Err(SensorFault::NoFinger) {
            return Ok(());
        }
        if waited >= timings.lift_timeout {
            return Err(EnrollAbort::NotLifted);
        }
        if !wait(timings.poll) {
            return Err(EnrollAbort::Cancelled);
        }
        waited += timings.poll;
    }
}

/// Enroll task body.  Publishes the confirmation only on success.
pub fn run_enroll<S: FingerprintSensor>(
    claim: SensorClaim<S>,
    id: u16,
    timings: EnrollTimings,
    outbox: Arc<EventOutbox>,
    cancel: &CancelToken,
) {
    let board = claim.board().clone();
    info!("Enroll: starting for id {}", id);

    let result = enroll(&mut *claim.sensor(), id, &timings, &board, &mut |d| cancel.sleep(d));
    drop(claim);

    match result {
        Ok(()) => {
            info!("Enroll: stored id {}", id);
            board.set_activity(&format!("Enrolled #{id}"));
            outbox.publish(FingerprintEvent::enrolled(id));
        }
        Err(EnrollAbort::Cancelled) => {
            info!("Enroll: cancelled");
            board.set_activity("");
        }
        Err(e) => {
            warn!("Enroll: id {} aborted: {}", id, e);
            board.set_activity(&format!("Enroll failed: {e}"));
        }
    }
}
