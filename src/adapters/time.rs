//! ESP32 time adapter.
//!
//! Provides the monotonic millisecond clock, the SNTP-backed wall clock
//! and a blocking delay for the pondgate control loop.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer and `gettimeofday()` for calendar time.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` and a
//!   settable wall clock for host-side testing and simulation.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{MonotonicClock, WallClock};

/// Time adapter for the ESP32-S3 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    wall: core::cell::Cell<Option<u32>>,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            wall: core::cell::Cell::new(None),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Pretend SNTP delivered `secs`. `None` drops back to unsynchronised.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_utc_epoch_secs(&self, secs: Option<u32>) {
        self.wall.set(secs);
    }
}

impl MonotonicClock for Esp32TimeAdapter {
    fn now_ms(&self) -> u32 {
        // Truncation is the documented u32 wrap.
        (self.uptime_us() / 1_000) as u32
    }
}

impl WallClock for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn utc_epoch_secs(&self) -> Option<u32> {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        u32::try_from(tv.tv_sec).ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn utc_epoch_secs(&self) -> Option<u32> {
        self.wall.get()
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Blocking delay used by the Modbus reader and the main loop.
///
/// On target, waits of a FreeRTOS tick or longer yield to the scheduler;
/// shorter ones busy-wait in ROM.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

#[cfg(target_os = "espidf")]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        use esp_idf_hal::delay::{Ets, FreeRtos};

        let us = ns.div_ceil(1_000);
        if us >= 10_000 {
            FreeRtos::delay_ms(us / 1_000);
        } else {
            Ets::delay_us(us);
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
