//! JSON text-frame protocol spoken with the collector.
//!
//! | Direction | Frame                                   |
//! |-----------|-----------------------------------------|
//! | out       | `{"action":"attendance","id":<int>}`     |
//! | out       | `{"action":"enroll_confirm","id":<int>}` |
//! | in        | `{"action":"enroll","id":<int>}`         |
//!
//! Unknown inbound actions are ignored; anything that is not a JSON object
//! with a string `action` is malformed.

use serde::{Deserialize, Serialize};

use crate::app::events::{FingerprintEvent, FingerprintKind, InboundCommand};
use crate::error::SessionError;

#[derive(Serialize)]
struct OutboundFrame {
    action: &'static str,
    id: u16,
}

#[derive(Deserialize)]
struct InboundFrame {
    action: String,
    #[serde(default)]
    id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not JSON, or missing the `action` string.
    Malformed,
    /// Well-formed frame with an action this device does not handle.
    UnknownAction(String),
    /// `enroll` without an id, or an id outside `0..=65535`.
    BadId,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed frame"),
            Self::UnknownAction(a) => write!(f, "unknown action '{a}'"),
            Self::BadId => write!(f, "missing or out-of-range id"),
        }
    }
}

pub fn encode_event(event: &FingerprintEvent) -> Result<String, SessionError> {
    let action = match event.kind {
        FingerprintKind::AttendanceMatch => "attendance",
        FingerprintKind::EnrollConfirm => "enroll_confirm",
    };
    serde_json::to_string(&OutboundFrame { action, id: event.id }).map_err(|_| SessionError::Encode)
}

pub fn decode_command(frame: &str) -> Result<InboundCommand, DecodeError> {
    let parsed: InboundFrame = serde_json::from_str(frame).map_err(|_| DecodeError::Malformed)?;
    match parsed.action.as_str() {
        "enroll" => {
            let id = parsed
                .id
                .and_then(|id| u16::try_from(id).ok())
                .ok_or(DecodeError::BadId)?;
            Ok(InboundCommand::Enroll { id })
        }
        _ => Err(DecodeError::UnknownAction(parsed.action)),
    }
}
