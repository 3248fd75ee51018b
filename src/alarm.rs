//! Alarm aggregator.
//!
//! Recomputed **every tick** from the current fault inputs and collapsed
//! into one [`AlarmState`]. Individual conditions are tracked in a bitmask
//! so each one is logged once when it sets and once when it clears.
//!
//! ## Priority
//!
//! | severity | kinds (display priority order)                  |
//! |----------|-------------------------------------------------|
//! | 2 Alarm  | relay interlock, gate timeout, sensor timeout   |
//! | 1 Warning| level jump, level out of range                  |
//! | 0        | "normal"                                        |
//!
//! Only the first active kind is displayed. Soft warnings stay raised for
//! a fixed window after the sample that triggered them; hard faults clear
//! as soon as their input does.
//!
//! Edge detection for the error log is a separate step,
//! [`log_transitions`](AlarmAggregator::log_transitions), run once per
//! tick after [`evaluate`](AlarmAggregator::evaluate).

use log::{error, info};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::config::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlarmKind {
    RelayInterlock = 0,
    GateTimeout = 1,
    SensorTimeout = 2,
    LevelJump = 3,
    LevelRange = 4,
}

impl AlarmKind {
    /// Display priority order.
    pub const ALL: [Self; 5] = [
        Self::RelayInterlock,
        Self::GateTimeout,
        Self::SensorTimeout,
        Self::LevelJump,
        Self::LevelRange,
    ];

    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::RelayInterlock | Self::GateTimeout | Self::SensorTimeout => Severity::Alarm,
            Self::LevelJump | Self::LevelRange => Severity::Warning,
        }
    }

    pub const fn text(self) -> &'static str {
        match self {
            Self::RelayInterlock => "Alarm: relay interlock triggered",
            Self::GateTimeout => "Alarm: gate execution timeout",
            Self::SensorTimeout => "Alarm: sensor offline or data timeout",
            Self::LevelJump => "Warning: abnormal level jump",
            Self::LevelRange => "Warning: level out of safe range",
        }
    }
}

impl core::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    #[default]
    Normal = 0,
    Warning = 1,
    Alarm = 2,
}

impl Severity {
    pub const fn level(self) -> u8 {
        self as u8
    }
}

/// Collapsed alarm view published to telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmState {
    pub severity: Severity,
    /// Displayed condition; `None` when normal.
    pub kind: Option<AlarmKind>,
}

impl AlarmState {
    pub const fn active(&self) -> bool {
        self.kind.is_some()
    }

    pub fn text(&self) -> &'static str {
        self.kind.map_or("normal", AlarmKind::text)
    }
}

pub struct AlarmAggregator {
    window_ms: u32,
    /// Bitmask of [`AlarmKind::mask`] values currently active.
    faults: u8,
    level_jump_until: Option<u32>,
    level_range_until: Option<u32>,
    current: AlarmState,
    /// State as of the last [`log_transitions`](Self::log_transitions).
    logged: AlarmState,
}

impl AlarmAggregator {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            window_ms: config.level_alarm_window_ms,
            faults: 0,
            level_jump_until: None,
            level_range_until: None,
            current: AlarmState::default(),
            logged: AlarmState::default(),
        }
    }

    /// Raise the level-jump warning for one window from `now_ms`.
    pub fn record_level_jump(&mut self, now_ms: u32) {
        self.level_jump_until = Some(now_ms.wrapping_add(self.window_ms));
    }

    /// Raise the out-of-range warning for one window from `now_ms`.
    pub fn record_level_out_of_range(&mut self, now_ms: u32) {
        self.level_range_until = Some(now_ms.wrapping_add(self.window_ms));
    }

    /// Recompute the alarm from this tick's inputs.
    pub fn evaluate(&mut self, now_ms: u32, interlock: bool, gate_timeout: bool, sensor_stale: bool) -> AlarmState {
        self.eval_fault(AlarmKind::RelayInterlock, interlock);
        self.eval_fault(AlarmKind::GateTimeout, gate_timeout);
        self.eval_fault(AlarmKind::SensorTimeout, sensor_stale);
        self.eval_fault(AlarmKind::LevelJump, window_open(self.level_jump_until, now_ms));
        self.eval_fault(AlarmKind::LevelRange, window_open(self.level_range_until, now_ms));

        let kind = AlarmKind::ALL.into_iter().find(|k| self.faults & k.mask() != 0);
        self.current = AlarmState {
            severity: kind.map_or(Severity::Normal, AlarmKind::severity),
            kind,
        };
        self.current
    }

    /// Emit an error-class event on entering or changing a severity-2
    /// alarm, and on leaving severity 2.
    pub fn log_transitions(&mut self, sink: &mut impl EventSink) {
        let (prev, cur) = (self.logged, self.current);
        if cur != prev {
            if cur.severity == Severity::Alarm {
                if let Some(kind) = cur.kind {
                    sink.emit(&AppEvent::AlarmRaised { kind });
                }
            } else if prev.severity == Severity::Alarm {
                sink.emit(&AppEvent::AlarmCleared);
            }
        }
        self.logged = cur;
    }

    pub fn state(&self) -> AlarmState {
        self.current
    }

    #[cfg(test)]
    fn faults(&self) -> u8 {
        self.faults
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(&mut self, kind: AlarmKind, condition: bool) {
        if condition {
            if self.faults & kind.mask() == 0 {
                error!("alarm: condition set: {kind}");
            }
            self.faults |= kind.mask();
        } else {
            if self.faults & kind.mask() != 0 {
                info!("alarm: condition cleared: {kind}");
            }
            self.faults &= !kind.mask();
        }
    }
}

fn window_open(until: Option<u32>, now_ms: u32) -> bool {
    until.is_some_and(|until| (until.wrapping_sub(now_ms) as i32) > 0)
}
