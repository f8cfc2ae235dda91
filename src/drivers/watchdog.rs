//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the foreground task to the TWDT.  The foreground feeds it on
//! every `WatchdogTick`; if the event loop wedges (or `main` halts after a
//! fatal timer fault) the device resets after [`TIMEOUT_MS`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{info, warn};

/// Reset after this long without a feed.
pub const TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    subscribed: bool,
    feeds: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: TWDT calls from the main task during boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms timeout)", TIMEOUT_MS);
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }
                Self { subscribed, feeds: 0 }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): feeds counted only");
            Self {
                subscribed: true,
                feeds: 0,
            }
        }
    }

    pub fn feed(&mut self) {
        if !self.subscribed {
            return;
        }
        #[cfg(target_os = "espidf")]
        // SAFETY: resets the calling task's TWDT entry; main task only.
        unsafe {
            esp_task_wdt_reset();
        }
        self.feeds = self.feeds.wrapping_add(1);
    }

    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

/// Stop feeding and wait for the TWDT to reset the device.
pub fn halt(reason: &str) -> ! {
    warn!("Watchdog: halting ({reason}); reset in {} ms", TIMEOUT_MS);
    loop {
        #[cfg(target_os = "espidf")]
        // SAFETY: plain FreeRTOS delay.
        unsafe {
            vTaskDelay(1000);
        }
        #[cfg(not(target_os = "espidf"))]
        std::thread::sleep(std::time::Duration::from_millis(1000));
    }
}
