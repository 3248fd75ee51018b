//! Hardware error types shared by the drivers and the ports.
//!
//! All variants are `Copy` so they can be logged and stored freely.
//! Peripheral bring-up uses [`HwInitError`](crate::drivers::hw_init::HwInitError)
//! and storage uses [`ConfigError`](crate::app::ports::ConfigError).
//!
//! Expected control outcomes (a blocked gate command, a missed sensor
//! poll) are *not* errors; they are modelled as return values and state.

use core::fmt;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Why a single Modbus attempt produced no reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Nothing arrived inside the response window.
    NoResponse,
    /// Bytes arrived but no valid frame was found before the window closed.
    Timeout,
    /// A frame with the right header failed its CRC.
    CrcMismatch,
    /// The serial driver reported an error.
    Bus,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::Timeout => write!(f, "response timeout"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::Bus => write!(f, "serial bus error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay errors
// ---------------------------------------------------------------------------

/// A relay output could not be driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// The GPIO driver rejected the write.
    GpioWriteFailed(i32),
    /// Pin number outside the GPIO matrix.
    InvalidPin(i32),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed(rc) => write!(f, "GPIO write failed (rc={rc})"),
            Self::InvalidPin(pin) => write!(f, "invalid GPIO {pin}"),
        }
    }
}

impl core::error::Error for SensorError {}
impl core::error::Error for RelayError {}
