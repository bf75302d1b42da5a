//! Continuous attendance matching.
//!
//! ```text
//!  Idle ──▶ Capturing ──▶ Converting ──▶ Matching ──▶ Reporting
//!              ▲  │ no finger   │ bad image   │ not found /   │
//!              │  └─ backoff    │             │ low score     │
//!              └────────────────┴─────────────┴───────────────┘
//! ```
//!
//! A score only counts as a match when it is strictly above the configured
//! threshold.  After a report the workflow waits for the finger to leave
//! the window before capturing again, so one touch yields one event.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::events::FingerprintEvent;
use crate::app::ports::{CharBuffer, FingerprintSensor, MatchResult};
use crate::error::SensorFault;
use crate::session::outbox::EventOutbox;
use crate::tasks::CancelToken;

use super::SensorClaim;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Capturing,
    Converting,
    Matching,
    Reporting,
}

/// What the driver loop should do after one [`MatchWorkflow::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Transient failure or empty window; sleep before the next step.
    Backoff,
    Matched(MatchResult),
}

#[derive(Debug)]
pub struct MatchWorkflow {
    phase: MatchPhase,
    threshold: u16,
    found: Option<MatchResult>,
    awaiting_lift: bool,
}

impl MatchWorkflow {
    pub fn new(threshold: u16) -> Self {
        Self {
            phase: MatchPhase::Idle,
            threshold,
            found: None,
            awaiting_lift: false,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Run exactly one transition.
    pub fn step(&mut self, sensor: &mut impl FingerprintSensor) -> StepOutcome {
        match self.phase {
            MatchPhase::Idle => {
                self.phase = MatchPhase::Capturing;
                StepOutcome::Continue
            }
            MatchPhase::Capturing => self.capture(sensor),
            MatchPhase::Converting => {
                match sensor.convert(CharBuffer::One) {
                    Ok(()) => self.phase = MatchPhase::Matching,
                    Err(e) => {
                        debug!("Match: convert failed: {}", e);
                        self.phase = MatchPhase::Capturing;
                    }
                }
                StepOutcome::Continue
            }
            MatchPhase::Matching => {
                match sensor.search() {
                    Ok(hit) if hit.confidence > self.threshold => {
                        self.found = Some(hit);
                        self.phase = MatchPhase::Reporting;
                    }
                    Ok(hit) => {
                        debug!("Match: id {} scored {} (<= {})", hit.id, hit.confidence, self.threshold);
                        self.phase = MatchPhase::Capturing;
                    }
                    Err(SensorFault::NotFound) => self.phase = MatchPhase::Capturing,
                    Err(e) => {
                        warn!("Match: search failed: {}", e);
                        self.phase = MatchPhase::Capturing;
                    }
                }
                StepOutcome::Continue
            }
            MatchPhase::Reporting => {
                self.phase = MatchPhase::Capturing;
                self.awaiting_lift = true;
                match self.found.take() {
                    Some(hit) => StepOutcome::Matched(hit),
                    None => StepOutcome::Continue,
                }
            }
        }
    }

    fn capture(&mut self, sensor: &mut impl FingerprintSensor) -> StepOutcome {
        match sensor.capture() {
            Ok(()) if self.awaiting_lift => StepOutcome::Backoff,
            Ok(()) => {
                self.phase = MatchPhase::Converting;
                StepOutcome::Continue
            }
            Err(SensorFault::NoFinger) => {
                self.awaiting_lift = false;
                StepOutcome::Backoff
            }
            Err(e) => {
                if !e.is_transient() {
                    warn!("Match: capture failed: {}", e);
                }
                StepOutcome::Backoff
            }
        }
    }
}

/// Match task body.  Runs until cancelled; the claim is released on return.
pub fn run_match<S: FingerprintSensor>(
    claim: SensorClaim<S>,
    outbox: Arc<EventOutbox>,
    threshold: u16,
    backoff: Duration,
    cancel: &CancelToken,
) {
    let board = claim.board().clone();
    if !board.snapshot().session_up {
        info!("Match: no session, not starting");
        board.set_activity("Connect to server");
        return;
    }

    info!("Match: scanning (threshold {})", threshold);
    board.set_activity("Place finger");
    let mut workflow = MatchWorkflow::new(threshold);

    while !cancel.is_cancelled() {
        let outcome = workflow.step(&mut *claim.sensor());
        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Backoff => {
                if !cancel.sleep(backoff) {
                    break;
                }
            }
            StepOutcome::Matched(hit) => {
                info!("Match: id {} (confidence {})", hit.id, hit.confidence);
                board.set_activity(&format!("Welcome #{}", hit.id));
                outbox.publish(FingerprintEvent::attendance(hit.id));
            }
        }
    }

    info!("Match: stopped");
    board.set_activity("");
}
