//! Six-channel relay bank driver.
//!
//! CH1/CH2 drive the gate motor (open/close direction), CH3..CH6 are
//! auxiliary loads. All outputs are active HIGH. The bank only moves pins;
//! the interlock rules live in [`GateActuator`](crate::gate::GateActuator).

use log::{debug, warn};

use crate::app::ports::{RelayChannel, RelayPort};
use crate::drivers::hw_init;
use crate::pins;

pub struct RelayBank {
    /// Last commanded level per channel.
    commanded: [bool; 6],
}

impl Default for RelayBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayBank {
    /// Take ownership of the relay pins and drive them all low.
    pub fn new() -> Self {
        let mut bank = Self { commanded: [false; 6] };
        bank.all_off();
        bank
    }

    pub fn all_off(&mut self) {
        for ch in RelayChannel::ALL {
            self.set_relay(ch, false);
        }
    }

    pub fn commanded(&self, channel: RelayChannel) -> bool {
        self.commanded[channel.index()]
    }
}

impl RelayPort for RelayBank {
    fn set_relay(&mut self, channel: RelayChannel, on: bool) {
        let i = channel.index();
        if self.commanded[i] != on {
            debug!("relay: CH{} -> {}", channel.number(), if on { "on" } else { "off" });
        }
        self.commanded[i] = on;
        if let Err(e) = hw_init::gpio_write(pins::RELAY_GPIOS[i], on) {
            warn!("relay: CH{} write failed: {}", channel.number(), e);
        }
    }

    fn relay_level(&self, channel: RelayChannel) -> bool {
        hw_init::gpio_read(pins::RELAY_GPIOS[channel.index()])
    }
}
