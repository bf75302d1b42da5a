//! Monotonic time.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic,
//!   callable from ISRs).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` anchored at
//!   first use, for host-side testing and simulation.

use core::time::Duration;

/// Time since boot.
#[cfg(target_os = "espidf")]
pub fn monotonic() -> Duration {
    // SAFETY: reads the free-running system timer; no side effects.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

/// Time since first call.
#[cfg(not(target_os = "espidf"))]
pub fn monotonic() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Milliseconds since boot, truncated to `u32` (wraps after ~49 days).
/// Consumers compare with `wrapping_sub`.
pub fn now_ms() -> u32 {
    monotonic().as_millis() as u32
}
