//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GateController (domain)
//! ```
//!
//! Driven adapters (relay bank, sensor bus, clocks, event sinks, storage)
//! implement these traits. The [`GateController`](super::service::GateController)
//! consumes them via generics, so the domain core never touches hardware
//! directly and every timing path can be driven from tests.

use crate::automation::rules::ControlConfig;
use crate::config::GateConfig;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Relay channels
// ───────────────────────────────────────────────────────────────

/// The six outputs of the relay board. CH1/CH2 drive the gate motor and
/// are owned by the [`GateActuator`](crate::gate::GateActuator); CH3..CH6
/// are auxiliary loads toggled by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayChannel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
    Ch5,
    Ch6,
}

impl RelayChannel {
    pub const ALL: [Self; 6] = [Self::Ch1, Self::Ch2, Self::Ch3, Self::Ch4, Self::Ch5, Self::Ch6];
    pub const AUX: [Self; 4] = [Self::Ch3, Self::Ch4, Self::Ch5, Self::Ch6];

    /// Open-direction gate relay.
    pub const GATE_OPEN: Self = Self::Ch1;
    /// Close-direction gate relay.
    pub const GATE_CLOSE: Self = Self::Ch2;

    /// Zero-based index (CH1 = 0).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// One-based channel number as printed on the board.
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }

    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Ch1),
            2 => Some(Self::Ch2),
            3 => Some(Self::Ch3),
            4 => Some(Self::Ch4),
            5 => Some(Self::Ch5),
            6 => Some(Self::Ch6),
            _ => None,
        }
    }

    /// Position of an auxiliary channel in the CH3..CH6 table.
    pub const fn aux_index(self) -> Option<usize> {
        match self {
            Self::Ch1 | Self::Ch2 => None,
            other => Some(other as usize - 2),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the relay board.
pub trait RelayPort {
    /// Drive one relay output.
    fn set_relay(&mut self, channel: RelayChannel, on: bool);

    /// Electrical level read back from the output pin. Used by the
    /// interlock self-check to catch outputs driven behind the domain's back.
    fn relay_level(&self, channel: RelayChannel) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One accepted level/temperature sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelReading {
    pub level_mm: u16,
    /// Water temperature in tenths of a degree Celsius.
    pub temp_x10: i16,
}

/// Read-side port: one bounded read-with-retry per call.
pub trait SensorPort {
    /// `None` means every attempt failed. Callers treat that as "no update
    /// this poll", never as a zero level.
    fn read_level(&mut self, sensor_id: u8) -> Option<LevelReading>;
}

/// Byte transport underneath the Modbus reader (RS-485 UART on target).
pub trait SensorBus {
    /// Discard everything waiting in the receive buffer.
    fn clear_input(&mut self);

    /// Queue a request frame and wait for it to leave the transmitter.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), SensorError>;

    /// Copy whatever is already buffered into `buf` without blocking.
    /// Returns the number of bytes copied (0 when idle).
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clocks
// ───────────────────────────────────────────────────────────────

/// Milliseconds since boot. Wraps at `u32::MAX`; consumers compare with
/// wrapping arithmetic.
pub trait MonotonicClock {
    fn now_ms(&self) -> u32;
}

/// Calendar time source (SNTP on target).
pub trait WallClock {
    /// UTC seconds since the Unix epoch as the RTC reads them. Before the
    /// first sync this is a small boot-relative value; callers decide
    /// what counts as valid.
    fn utc_epoch_secs(&self) -> Option<u32>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, log
/// files, MQTT, a BLE characteristic).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration ports (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device tunables.
///
/// Implementations MUST validate before persisting. Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`GateConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<GateConfig, ConfigError>;

    fn save(&self, config: &GateConfig) -> Result<(), ConfigError>;
}

/// Loads and persists the automation rule document.
pub trait ControlConfigPort {
    /// [`ConfigError::NotFound`] when nothing has been stored yet,
    /// [`ConfigError::Corrupted`] when the stored document does not parse.
    fn load_control(&self) -> Result<ControlConfig, ConfigError>;

    /// Store the document text verbatim.
    fn save_control_text(&self, text: &str) -> Result<(), ConfigError>;

    fn save_control(&self, config: &ControlConfig) -> Result<(), ConfigError> {
        let text = config.to_json().map_err(|_| ConfigError::IoError)?;
        self.save_control_text(&text)
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] and [`ControlConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbering_is_one_based() {
        for (i, ch) in RelayChannel::ALL.iter().enumerate() {
            assert_eq!(ch.index(), i);
            assert_eq!(RelayChannel::from_number(ch.number()), Some(*ch));
        }
        assert_eq!(RelayChannel::from_number(0), None);
        assert_eq!(RelayChannel::from_number(7), None);
    }

    #[test]
    fn only_ch3_to_ch6_are_aux() {
        assert_eq!(RelayChannel::Ch1.aux_index(), None);
        assert_eq!(RelayChannel::Ch2.aux_index(), None);
        assert_eq!(RelayChannel::Ch3.aux_index(), Some(0));
        assert_eq!(RelayChannel::Ch6.aux_index(), Some(3));
        assert!(RelayChannel::AUX.iter().all(|c| c.aux_index().is_some()));
    }
}
