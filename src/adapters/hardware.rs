//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`RelayBank`] and the sensor reader, exposing them through
//! [`RelayPort`] and [`SensorPort`] so the controller can take one `&mut`
//! for the whole tick. On non-espidf targets the underlying drivers use
//! cfg-gated simulation stubs.

use crate::app::ports::{LevelReading, RelayChannel, RelayPort, SensorPort};
use crate::drivers::relay::RelayBank;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<S> {
    relays: RelayBank,
    sensors: S,
}

impl<S: SensorPort> HardwareAdapter<S> {
    pub fn new(relays: RelayBank, sensors: S) -> Self {
        Self { relays, sensors }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<S: SensorPort> SensorPort for HardwareAdapter<S> {
    fn read_level(&mut self, sensor_id: u8) -> Option<LevelReading> {
        self.sensors.read_level(sensor_id)
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<S> RelayPort for HardwareAdapter<S> {
    fn set_relay(&mut self, channel: RelayChannel, on: bool) {
        self.relays.set_relay(channel, on);
    }

    fn relay_level(&self, channel: RelayChannel) -> bool {
        self.relays.relay_level(channel)
    }
}
