//! ISR-debounced menu buttons.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups.  The GPIO fires on the
//! falling edge; the ISR calls [`DebouncedButton::on_falling_edge`], which
//! drops edges closer than [`DEBOUNCE_MS`] to the previous accepted edge and
//! otherwise pushes the button's [`Command`] into the queue.  Nothing else
//! happens in interrupt context.
//!
//! On ESP-IDF the HAL disables a pin's interrupt after each notification,
//! so the dispatcher task calls [`ButtonPins::rearm`] on every pass.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::app::commands::Command;
use crate::events::CommandQueue;

pub const DEBOUNCE_MS: u32 = 50;

/// One button bound to one command.  Lives in a `static` so the ISR can
/// reach it.
pub struct DebouncedButton {
    command: Command,
    last_edge_ms: AtomicU32,
    seen_edge: AtomicBool,
}

impl DebouncedButton {
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            last_edge_ms: AtomicU32::new(0),
            seen_edge: AtomicBool::new(false),
        }
    }

    /// ISR handler for the falling edge.  Lock-free; safe from interrupt
    /// context.  Returns `true` if a command was enqueued.
    pub fn on_falling_edge(&self, now_ms: u32, queue: &CommandQueue) -> bool {
        let last = self.last_edge_ms.load(Ordering::Acquire);
        if self.seen_edge.load(Ordering::Acquire) && now_ms.wrapping_sub(last) < DEBOUNCE_MS {
            return false;
        }
        self.last_edge_ms.store(now_ms, Ordering::Release);
        self.seen_edge.store(true, Ordering::Release);
        queue.push(self.command)
    }

    pub fn command(&self) -> Command {
        self.command
    }
}

pub static ADVANCE_BUTTON: DebouncedButton = DebouncedButton::new(Command::Advance);
pub static SELECT_BUTTON: DebouncedButton = DebouncedButton::new(Command::Select);

// ── ESP-IDF interrupt wiring ──────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::ButtonPins;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::gpio::{AnyIOPin, Input, InterruptType, PinDriver, Pull};
    use esp_idf_svc::sys::EspError;
    use log::{info, warn};

    use super::{ADVANCE_BUTTON, SELECT_BUTTON};
    use crate::adapters::time::now_ms;
    use crate::events::COMMANDS;

    /// The two menu button pins with their ISRs subscribed.
    pub struct ButtonPins {
        advance: PinDriver<'static, AnyIOPin, Input>,
        select: PinDriver<'static, AnyIOPin, Input>,
    }

    impl ButtonPins {
        pub fn new(advance: AnyIOPin, select: AnyIOPin) -> Result<Self, EspError> {
            let mut advance = PinDriver::input(advance)?;
            let mut select = PinDriver::input(select)?;
            for pin in [&mut advance, &mut select] {
                pin.set_pull(Pull::Up)?;
                pin.set_interrupt_type(InterruptType::NegEdge)?;
            }

            // SAFETY: the callbacks only touch atomics and the lock-free
            // command queue, both of which are ISR-safe.
            unsafe {
                advance.subscribe(|| {
                    ADVANCE_BUTTON.on_falling_edge(now_ms(), &COMMANDS);
                })?;
                select.subscribe(|| {
                    SELECT_BUTTON.on_falling_edge(now_ms(), &COMMANDS);
                })?;
            }

            let mut pins = Self { advance, select };
            pins.rearm();
            info!("Buttons: ISRs armed");
            Ok(pins)
        }

        /// Re-enable both interrupts.  Call from task context after each
        /// dispatcher pass.
        pub fn rearm(&mut self) {
            if let Err(e) = self.advance.enable_interrupt() {
                warn!("Buttons: advance rearm failed: {e}");
            }
            if let Err(e) = self.select.enable_interrupt() {
                warn!("Buttons: select rearm failed: {e}");
            }
        }
    }
}
