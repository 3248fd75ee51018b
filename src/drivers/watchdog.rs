//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the board if the control loop stops feeding it. A stalled loop
//! could leave a gate relay energised with nothing to stop the stroke, so
//! the window is sized from the worst-case tick of the configured loop.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;
use log::info;

use crate::config::GateConfig;

/// Lower bound for the TWDT window.
pub const MIN_TIMEOUT_MS: u32 = 10_000;

/// Headroom over the worst-case tick.
const TICK_MARGIN: u32 = 4;

/// Settle delay the Modbus reader spends before each request.
const MODBUS_SETTLE_MS: u32 = 5;

/// Longest a single control tick can block: one sensor poll with every
/// retry timing out, plus the loop delay.
pub fn worst_tick_ms(config: &GateConfig) -> u32 {
    let attempts = u32::from(config.modbus_retry_count.max(1));
    let exchange = config.modbus_timeout_ms.saturating_add(MODBUS_SETTLE_MS);
    exchange
        .saturating_mul(attempts)
        .saturating_add(config.modbus_retry_gap_ms.saturating_mul(attempts - 1))
        .saturating_add(config.control_loop_interval_ms)
}

pub fn timeout_for(config: &GateConfig) -> u32 {
    worst_tick_ms(config).saturating_mul(TICK_MARGIN).max(MIN_TIMEOUT_MS)
}

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Configure the TWDT for `config` and subscribe the calling task.
    pub fn for_config(config: &GateConfig) -> Self {
        let timeout_ms = timeout_for(config);

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: TWDT calls from the main task during boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("watchdog: subscribed ({} ms, panic on trigger)", timeout_ms);
                } else {
                    warn!("watchdog: failed to subscribe ({})", ret);
                }

                Self { timeout_ms, subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("watchdog(sim): no-op ({} ms)", timeout_ms);
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Must be called at least once per timeout.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the TWDT entry of the calling (subscribed) task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}
