//! One-shot hardware peripheral initialization.
//!
//! Configures the relay GPIOs using raw ESP-IDF sys calls. Called once
//! from `main()` before the control loop starts.
//!
//! Relay pins are set up as input+output so the interlock self-check can
//! read back the level actually present on the pin, not just what this
//! firmware last wrote.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::error::RelayError;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::UartInitFailed(rc) => write!(f, "sensor UART init failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_relay_outputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Relay outputs ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_relay_outputs() -> Result<(), HwInitError> {
    for &pin in &pins::RELAY_GPIOS {
        // Drive low before enabling the output so no relay chatters at boot.
        unsafe { gpio_set_level(pin, 0) };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: relay outputs CH1-CH6 configured (all off)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), RelayError> {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_relay_outputs(). Main-loop only.
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(RelayError::GpioWriteFailed(ret));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on a pin
    // configured with its input buffer enabled.
    (unsafe { gpio_get_level(pin) }) != 0
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicBool, Ordering};

    use crate::error::RelayError;

    const PIN_COUNT: usize = 49;

    /// Simulated pin levels; writes are read back like a real
    /// input+output pin.
    static LEVELS: [AtomicBool; PIN_COUNT] = [const { AtomicBool::new(false) }; PIN_COUNT];

    pub fn write(pin: i32, high: bool) -> Result<(), RelayError> {
        let level = usize::try_from(pin)
            .ok()
            .and_then(|p| LEVELS.get(p))
            .ok_or(RelayError::InvalidPin(pin))?;
        level.store(high, Ordering::Relaxed);
        Ok(())
    }

    pub fn read(pin: i32) -> bool {
        usize::try_from(pin)
            .ok()
            .and_then(|p| LEVELS.get(p))
            .is_some_and(|level| level.load(Ordering::Relaxed))
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), RelayError> {
    sim::write(pin, high)
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim::read(pin)
}
