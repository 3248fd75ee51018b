//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production). Each
//! [`LogClass`] gets its own log target so the console, a file logger or
//! a remote collector can split the action, measurement and error logs.
//! A future MQTT or BLE adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::{AppEvent, LogClass};
use crate::app::ports::EventSink;

pub const ACTION_TARGET: &str = "gate::action";
pub const MEASURE_TARGET: &str = "gate::measure";
pub const ERROR_TARGET: &str = "gate::error";
pub const TELEMETRY_TARGET: &str = "gate::telemetry";

/// Log target for an event class.
pub const fn target(class: LogClass) -> &'static str {
    match class {
        LogClass::Action => ACTION_TARGET,
        LogClass::Measure => MEASURE_TARGET,
        LogClass::Error => ERROR_TARGET,
        LogClass::Telemetry => TELEMETRY_TARGET,
    }
}

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let class = event.class();
        let target = target(class);
        match event {
            AppEvent::AlarmRaised { .. } => error!(target: target, "{}", event),
            AppEvent::AlarmCleared => warn!(target: target, "{}", event),
            AppEvent::Telemetry(t) => match serde_json::to_string(t) {
                Ok(json) => info!(target: target, "{}", json),
                Err(e) => warn!(target: target, "telemetry encode failed: {}", e),
            },
            _ => info!(target: target, "{}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_has_its_own_target() {
        let targets = [LogClass::Action, LogClass::Measure, LogClass::Error, LogClass::Telemetry].map(target);
        for (i, a) in targets.iter().enumerate() {
            assert!(a.starts_with("gate::"));
            assert!(targets[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn emit_accepts_every_class() {
        let mut sink = LogEventSink::new();
        sink.emit(&AppEvent::Started);
        sink.emit(&AppEvent::AlarmCleared);
        sink.emit(&AppEvent::AlarmRaised { kind: crate::alarm::AlarmKind::GateTimeout });
    }
}
