//! Biometric events and remote commands.
//!
//! Outbound [`FingerprintEvent`]s are fire-and-forget: they are handed to
//! the [`EventOutbox`](crate::session::outbox::EventOutbox) and dropped when
//! no session is up.  Inbound [`InboundCommand`]s are decoded from socket
//! text frames by [`protocol`](crate::session::protocol).

/// What a fingerprint workflow reports to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    /// A finger matched a stored template during attendance.
    AttendanceMatch,
    /// A template was enrolled and stored.
    EnrollConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintEvent {
    pub kind: FingerprintKind,
    pub id: u16,
}

impl FingerprintEvent {
    pub const fn attendance(id: u16) -> Self {
        Self {
            kind: FingerprintKind::AttendanceMatch,
            id,
        }
    }

    pub const fn enrolled(id: u16) -> Self {
        Self {
            kind: FingerprintKind::EnrollConfirm,
            id,
        }
    }
}

/// A request received from the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    Enroll { id: u16 },
}
