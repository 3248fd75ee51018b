//! PondGate firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod alarm;
pub mod app;
pub mod automation;
pub mod config;
pub mod gate;
pub mod sensors;
pub mod takeover;

pub mod error;
pub mod pins;

// Hardware-facing layers; real implementations are cfg-gated inside.
pub mod adapters;
pub mod drivers;
