//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the gate controller together: command parsing,
//! outbound events, the cross-task command intake and the root tick in
//! [`service`]. All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod intake;
pub mod ports;
pub mod service;
