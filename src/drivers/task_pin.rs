//! Core-pinned task spawning for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread, so the config→spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): WiFi, lwIP, the socket client.
    Pro = 0,
    /// Core 1 (APP_CPU): UI, gauge and fingerprint work.
    App = 1,
}

/// Placement of one long-running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Null-terminated task name (e.g. `"battery\0"`).
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

// Priorities mirror the FreeRTOS layout of the terminal: connectivity and the
// session run hottest, the panel refresh coolest.
pub const BATTERY_TASK: TaskSpec = TaskSpec { name: "battery\0", core: Core::App, priority: 1, stack_kb: 4 };
pub const CONNECTIVITY_TASK: TaskSpec = TaskSpec { name: "wifi\0", core: Core::Pro, priority: 3, stack_kb: 8 };
pub const DISPLAY_TASK: TaskSpec = TaskSpec { name: "display\0", core: Core::App, priority: 1, stack_kb: 4 };
pub const DISPATCHER_TASK: TaskSpec = TaskSpec { name: "menu\0", core: Core::App, priority: 2, stack_kb: 6 };
pub const SESSION_TASK: TaskSpec = TaskSpec { name: "session\0", core: Core::Pro, priority: 3, stack_kb: 8 };
pub const MATCH_TASK: TaskSpec = TaskSpec { name: "match\0", core: Core::App, priority: 2, stack_kb: 6 };
pub const ENROLL_TASK: TaskSpec = TaskSpec { name: "enroll\0", core: Core::App, priority: 2, stack_kb: 6 };

/// Spawn a thread pinned to a specific core with explicit priority and stack.
///
/// On ESP-IDF, uses `esp_pthread_set_cfg()` to configure core affinity,
/// priority, and stack size before `std::thread::spawn`.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by the default
    // constructor and only read by the next pthread_create on this thread.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
        }
    }

    let display_name = spec.name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new().name(display_name.into()).spawn(f)
}

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    let display_name = spec.name.trim_end_matches('\0');
    log::debug!("Spawning '{}' (sim, no core pinning, stack={}KB)", display_name, spec.stack_kb);

    // Host test threads need more headroom than the FreeRTOS stacks.
    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_are_null_terminated() {
        for spec in [
            BATTERY_TASK,
            CONNECTIVITY_TASK,
            DISPLAY_TASK,
            DISPATCHER_TASK,
            SESSION_TASK,
            MATCH_TASK,
            ENROLL_TASK,
        ] {
            assert!(spec.name.ends_with('\0'), "{} missing terminator", spec.name);
        }
    }

    #[test]
    fn spawned_task_runs() {
        let handle = spawn_on_core(BATTERY_TASK, || {}).unwrap();
        handle.join().unwrap();
    }
}
