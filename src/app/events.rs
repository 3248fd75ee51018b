//! Outbound application events.
//!
//! The [`GateController`](super::service::GateController) and the
//! components it owns emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: write the action/measurement/error logs,
//! publish telemetry over MQTT, update a BLE characteristic, etc.
//!
//! `Display` renders the fixed log line for each event.

use core::fmt;

use serde::Serialize;

use crate::alarm::AlarmKind;
use crate::app::ports::RelayChannel;
use crate::gate::{BlockReason, GateDirection};

/// Which append-only log an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    /// State transitions, automation firings, operator commands.
    Action,
    /// Periodic sensor snapshot.
    Measure,
    /// Severity-2 alarm transitions.
    Error,
    /// Status snapshot for UIs and uplinks.
    Telemetry,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The controller finished its boot sequence.
    Started,

    // ── Gate ──
    GateStarted(GateDirection),
    GateStopped,
    GateBlocked { direction: GateDirection, reason: BlockReason },

    // ── Automation ──
    DailyFired { rule: usize, direction: GateDirection, minute_of_day: u32 },
    CycleStep { started: bool, step: usize, direction: GateDirection, duration_ms: u32 },
    LevelDiffTriggered { rule: usize, direction: GateDirection, delta_mm: i32, threshold_mm: i32 },
    ControlConfigReloaded,

    // ── Operator ──
    AuxRelay { channel: RelayChannel, on: bool },
    AllAuxOn,
    AllOff,
    TakeoverStarted { duration_ms: u32 },
    TakeoverEnded,
    AutoEnabled,
    AutoLatchedOff,

    // ── Measurement / alarms / telemetry ──
    Measurement(MeasurementData),
    AlarmRaised { kind: AlarmKind },
    AlarmCleared,
    Telemetry(TelemetryData),
}

impl AppEvent {
    pub const fn class(&self) -> LogClass {
        match self {
            Self::Measurement(_) => LogClass::Measure,
            Self::AlarmRaised { .. } | Self::AlarmCleared => LogClass::Error,
            Self::Telemetry(_) => LogClass::Telemetry,
            _ => LogClass::Action,
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("controller started"),
            Self::GateStarted(d) => write!(f, "gate_{}_start", d.as_str()),
            Self::GateStopped => f.write_str("gate_stop"),
            Self::GateBlocked { direction, reason } => {
                write!(f, "gate_{}_blocked: {}", direction.as_str(), reason)
            }
            Self::DailyFired { rule, direction, minute_of_day } => write!(
                f,
                "daily[{}] fire {} {:02}:{:02}",
                rule,
                direction.as_str(),
                minute_of_day / 60,
                minute_of_day % 60
            ),
            Self::CycleStep { started, step, direction, duration_ms } => write!(
                f,
                "cycle {} step={} state={} dur_ms={}",
                if *started { "start" } else { "next" },
                step,
                direction.as_str(),
                duration_ms
            ),
            Self::LevelDiffTriggered { rule, direction, delta_mm, threshold_mm } => {
                let cmp = match direction {
                    GateDirection::Open => "<=",
                    GateDirection::Close => ">=",
                };
                write!(
                    f,
                    "leveldiff[{}] {} delta={} {} {}",
                    rule,
                    direction.as_str(),
                    delta_mm,
                    cmp,
                    threshold_mm
                )
            }
            Self::ControlConfigReloaded => f.write_str("control config loaded"),
            Self::AuxRelay { channel, on } => {
                write!(f, "relay CH{} {}", channel.number(), if *on { "on" } else { "off" })
            }
            Self::AllAuxOn => f.write_str("relay all aux on"),
            Self::AllOff => f.write_str("relay all off"),
            Self::TakeoverStarted { duration_ms } => {
                write!(f, "manual_takeover start dur_ms={}", duration_ms)
            }
            Self::TakeoverEnded => f.write_str("manual_takeover end"),
            Self::AutoEnabled => f.write_str("auto enabled"),
            Self::AutoLatchedOff => f.write_str("auto latched off"),
            Self::Measurement(m) => fmt::Display::fmt(m, f),
            Self::AlarmRaised { kind } => write!(f, "alarm severity=2 text={}", kind.text()),
            Self::AlarmCleared => f.write_str("alarm cleared"),
            Self::Telemetry(t) => write!(
                f,
                "gate={} open={} auto={} alarm={}",
                t.gate_state,
                t.position_open,
                t.auto_enabled,
                t.alarm.text
            ),
        }
    }
}

/// Periodic sensor snapshot for the measurement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementData {
    pub inner_mm: u16,
    pub outer_mm: u16,
    pub inner_temp_x10: i16,
    pub outer_temp_x10: i16,
    pub online: [bool; 2],
    pub valid: [bool; 2],
}

impl fmt::Display for MeasurementData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inner_mm={} outer_mm={} t1_x10={} t2_x10={} online1={} online2={} valid1={} valid2={}",
            self.inner_mm,
            self.outer_mm,
            self.inner_temp_x10,
            self.outer_temp_x10,
            u8::from(self.online[0]),
            u8::from(self.online[1]),
            u8::from(self.valid[0]),
            u8::from(self.valid[1]),
        )
    }
}

/// One sensor as seen by telemetry consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SensorTelemetry {
    pub mm: u16,
    pub valid: bool,
    pub online: bool,
    pub temp_x10: i16,
    pub temp_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmTelemetry {
    pub active: bool,
    pub severity: u8,
    pub text: &'static str,
}

/// A point-in-time status snapshot. Reading it has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryData {
    /// Inner, outer.
    pub sensors: [SensorTelemetry; 2],
    pub gate_state: &'static str,
    pub position_open: bool,
    pub auto_enabled: bool,
    pub auto_latched: bool,
    pub manual_active: bool,
    pub manual_remaining_s: u32,
    pub relay1: bool,
    pub relay2: bool,
    /// CH3..CH6.
    pub aux: [bool; 4],
    pub open_allowed: bool,
    pub close_allowed: bool,
    /// Empty when nothing is blocked.
    pub block_reason: &'static str,
    pub alarm: AlarmTelemetry,
}
