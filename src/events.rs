//! Interrupt-safe command queue.
//!
//! Commands are produced by:
//! - button ISRs (`Advance`, `Select`) after debouncing
//! - the session task (`Enroll { id }` from a remote frame)
//!
//! and consumed by the dispatcher task, one at a time in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ Button ISR  │────▶│               │     │              │
//! │ Button ISR  │────▶│ Command Queue │────▶│  Dispatcher  │
//! │ Session     │────▶│  (bounded, 8) │     │  (consumer)  │
//! └─────────────┘     └───────────────┘     └──────────────┘
//! ```
//!
//! A full queue drops the new command; a lost button press is harmless and
//! the producer never blocks.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::Command;

/// Maximum number of pending commands.
pub const COMMAND_DEPTH: usize = 8;

/// Bounded MPMC queue of [`Command`]s.  `push` is safe from ISR context.
pub struct CommandQueue {
    channel: Channel<CriticalSectionRawMutex, Command, COMMAND_DEPTH>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue a command.  Returns `false` if the queue is full (dropped).
    pub fn push(&self, command: Command) -> bool {
        self.channel.try_send(command).is_ok()
    }

    /// Dequeue the oldest command, if any.
    pub fn pop(&self) -> Option<Command> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending commands into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Command)) {
        while let Some(command) = self.pop() {
            handler(command);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

/// The board-wide queue the button ISRs push into.
pub static COMMANDS: CommandQueue = CommandQueue::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = CommandQueue::new();
        assert!(q.push(Command::Advance));
        assert!(q.push(Command::Select));
        assert!(q.push(Command::Enroll { id: 4 }));
        assert_eq!(q.pop(), Some(Command::Advance));
        assert_eq!(q.pop(), Some(Command::Select));
        assert_eq!(q.pop(), Some(Command::Enroll { id: 4 }));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn full_queue_drops_new_command() {
        let q = CommandQueue::new();
        for _ in 0..COMMAND_DEPTH {
            assert!(q.push(Command::Advance));
        }
        assert!(!q.push(Command::Select));
        assert_eq!(q.len(), COMMAND_DEPTH);

        let mut seen = Vec::new();
        q.drain(|c| seen.push(c));
        assert!(seen.iter().all(|c| *c == Command::Advance));
        assert!(q.is_empty());
    }
}
