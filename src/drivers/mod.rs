//! Relay outputs, hardware initialisation, and the task watchdog.

pub mod hw_init;
pub mod relay;
pub mod watchdog;
