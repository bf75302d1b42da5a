//! Task Watchdog Timer (TWDT) driver.
//!
//! Each long-running loop (dispatcher, connectivity) subscribes its own
//! FreeRTOS task and feeds once per pass; the connectivity task also feeds
//! at every yield point inside a pass.  A loop wedged for longer than the
//! timeout resets the device.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Longest gap between feeds: one association poll (at most 10 s) or one
/// blocking scan, plus slack.
pub const TASK_TIMEOUT_MS: u32 = 15_000;

pub struct Watchdog {
    name: &'static str,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the calling task to the TWDT.
    pub fn subscribe(name: &'static str) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: reconfigure/add only touch the TWDT's own state and
            // accept a null handle meaning "current task".
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TASK_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::debug!("Watchdog: reconfigure returned {} (already configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    log::info!("Watchdog: '{}' subscribed ({}ms)", name, TASK_TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: '{}' failed to subscribe ({})", name, ret);
                }

                Self { name, subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::debug!("Watchdog(sim): '{}' no-op", name);
            Self { name }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Feed the watchdog. Must be called at least every [`TASK_TIMEOUT_MS`].
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the entry of the calling (subscribed) task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

impl Drop for Watchdog {
    /// Unsubscribe, so a task that ends cleanly cannot trip the TWDT.
    fn drop(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: removes the calling task, which `subscribe` added.
                let ret = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
                if ret != ESP_OK {
                    log::warn!("Watchdog: '{}' unsubscribe failed ({})", self.name, ret);
                }
            }
        }
    }
}
