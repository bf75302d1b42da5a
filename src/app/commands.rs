//! Commands consumed by the [`Dispatcher`](super::dispatcher::Dispatcher).
//!
//! Button interrupts produce `Advance` / `Select`; the session task turns
//! remote `enroll` frames into `Enroll`.  All of them travel through the
//! same [`CommandQueue`](crate::events::CommandQueue).

/// A lightweight request that is cheap to enqueue from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the menu cursor one slot.
    Advance,
    /// Activate the highlighted menu slot.
    Select,
    /// Enroll a fingerprint template under `id`.
    Enroll { id: u16 },
}
