//! Attendo fingerprint attendance terminal firmware library.
//!
//! Exposes the coordination logic, drivers and host-side simulations for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod biometric;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod menu;
pub mod pins;
pub mod provisioning;
pub mod runtime;
pub mod session;
pub mod state;
pub mod tasks;
