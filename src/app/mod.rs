//! Application core: coordination logic, zero direct I/O.
//!
//! The [`dispatcher`] turns queued commands into task starts and stops.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod ports;
