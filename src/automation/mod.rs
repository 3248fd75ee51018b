//! Automation decision engine.
//!
//! Runs once per control-loop tick, after the takeover window has been
//! expired and before the gate watchdog. Every decision is handed to the
//! [`GateActuator`] as an automated (non-manual) request, so the cooldown
//! and interlock guards apply unchanged.
//!
//! Mode dispatch:
//!
//! | mode        | behaviour                                                   |
//! |-------------|-------------------------------------------------------------|
//! | `cycle`     | follow the first runnable cycle rule                        |
//! | `daily`     | exact-minute triggers, once per rule+direction per day      |
//! | `leveldiff` | hysteresis on `inner - outer`                               |
//! | `mixed`     | cycle if runnable, else daily (time valid) then level-diff  |
//!
//! In mixed mode daily triggers and level-difference control share a tick;
//! nothing beyond the actuator's own guards separates them.

pub mod cycle;
pub mod daily;
pub mod level_diff;
pub mod rules;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ConfigError, ControlConfigPort, EventSink, RelayPort};
use crate::gate::{GateActuator, GateDirection};

use self::cycle::CycleRuntime;
use self::daily::{DailyFireGuard, LocalTime};
use self::rules::{ControlConfig, ControlMode};

/// Per-tick inputs gathered by the controller.
#[derive(Debug, Clone, Copy)]
pub struct AutomationInputs {
    pub now_ms: u32,
    /// UTC seconds, `None` while unsynchronised.
    pub utc_epoch_secs: Option<u32>,
    pub inner_mm: Option<u16>,
    pub outer_mm: Option<u16>,
    /// Enabled, not latched, no takeover window.
    pub automation_allowed: bool,
}

pub struct AutomationEngine {
    /// `None` until first use or after a reload request.
    config: Option<ControlConfig>,
    daily_guard: DailyFireGuard,
    cycle: CycleRuntime,
}

impl Default for AutomationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationEngine {
    pub fn new() -> Self {
        Self {
            config: None,
            daily_guard: DailyFireGuard::default(),
            cycle: CycleRuntime::default(),
        }
    }

    /// Load the rule document if it is not loaded yet.
    ///
    /// A missing document is replaced by the factory defaults and saved.
    /// A corrupted or unreadable one falls back to defaults for this boot
    /// without touching storage, and is not retried until a reload.
    pub fn ensure_loaded(&mut self, store: &impl ControlConfigPort, sink: &mut impl EventSink) {
        if self.config.is_some() {
            return;
        }
        let config = match store.load_control() {
            Ok(config) => {
                info!("automation: control config loaded (mode={})", config.mode.as_str());
                config
            }
            Err(ConfigError::NotFound) => {
                let defaults = ControlConfig::default();
                if let Err(e) = store.save_control(&defaults) {
                    warn!("automation: could not store default control config: {}", e);
                }
                info!("automation: no control config stored, defaults written");
                defaults
            }
            Err(e) => {
                warn!("automation: control config unusable ({}), using defaults", e);
                ControlConfig::default()
            }
        };
        self.config = Some(config);
        sink.emit(&AppEvent::ControlConfigReloaded);
    }

    /// Drop the loaded document; the next tick reloads it. The cycle cursor
    /// restarts from step 0.
    pub fn request_reload(&mut self) {
        self.config = None;
        self.cycle.reset();
    }

    pub fn config(&self) -> Option<&ControlConfig> {
        self.config.as_ref()
    }

    pub fn cycle_runtime(&self) -> &CycleRuntime {
        &self.cycle
    }

    /// Evaluate the configured mode and issue at most the resulting gate
    /// requests. No-op while automation is not allowed.
    pub fn tick(
        &mut self,
        inputs: &AutomationInputs,
        gate: &mut GateActuator,
        store: &impl ControlConfigPort,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        if !inputs.automation_allowed {
            return;
        }
        self.ensure_loaded(store, sink);
        let Some(config) = self.config.as_ref() else {
            return;
        };

        let local = inputs
            .utc_epoch_secs
            .and_then(|utc| LocalTime::from_utc(utc, config.tz_offset_ms));

        match config.mode {
            ControlMode::Cycle => {
                run_cycle(&mut self.cycle, config, inputs.now_ms, gate, hw, sink);
            }
            ControlMode::Daily => {
                if let Some(local) = local {
                    run_daily(&mut self.daily_guard, config, local, inputs.now_ms, gate, hw, sink);
                }
            }
            ControlMode::LevelDiff => {
                run_level_diff(config, inputs, gate, hw, sink);
            }
            ControlMode::Mixed => {
                if config.active_cycle().is_some() {
                    run_cycle(&mut self.cycle, config, inputs.now_ms, gate, hw, sink);
                    return;
                }
                self.cycle.reset();
                if let Some(local) = local {
                    run_daily(&mut self.daily_guard, config, local, inputs.now_ms, gate, hw, sink);
                }
                run_level_diff(config, inputs, gate, hw, sink);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mode runners
// ---------------------------------------------------------------------------

fn request(
    gate: &mut GateActuator,
    direction: GateDirection,
    now_ms: u32,
    hw: &mut impl RelayPort,
    sink: &mut impl EventSink,
) {
    // Refusals are reported by the actuator itself.
    let _ = gate.start(direction, now_ms, false, hw, sink);
}

fn run_cycle(
    runtime: &mut CycleRuntime,
    config: &ControlConfig,
    now_ms: u32,
    gate: &mut GateActuator,
    hw: &mut impl RelayPort,
    sink: &mut impl EventSink,
) {
    if let Some(action) = runtime.advance(config, now_ms, gate.is_action_active()) {
        sink.emit(&AppEvent::CycleStep {
            started: action.started,
            step: action.step,
            direction: action.direction,
            duration_ms: action.duration_ms,
        });
        request(gate, action.direction, now_ms, hw, sink);
    }
}

fn run_daily(
    guard: &mut DailyFireGuard,
    config: &ControlConfig,
    local: LocalTime,
    now_ms: u32,
    gate: &mut GateActuator,
    hw: &mut impl RelayPort,
    sink: &mut impl EventSink,
) {
    for fire in daily::due_triggers(&config.daily, local, guard) {
        sink.emit(&AppEvent::DailyFired {
            rule: fire.rule,
            direction: fire.direction,
            minute_of_day: fire.minute_of_day,
        });
        request(gate, fire.direction, now_ms, hw, sink);
    }
}

fn run_level_diff(
    config: &ControlConfig,
    inputs: &AutomationInputs,
    gate: &mut GateActuator,
    hw: &mut impl RelayPort,
    sink: &mut impl EventSink,
) {
    let decision = level_diff::evaluate(
        config,
        inputs.inner_mm,
        inputs.outer_mm,
        gate.is_action_active(),
        gate.position_open(),
    );
    if let Some(action) = decision {
        // The condition holds every tick through a cooldown; the actuator
        // reports those refusals at its own rate.
        if !gate.in_cooldown(inputs.now_ms) {
            sink.emit(&AppEvent::LevelDiffTriggered {
                rule: action.rule,
                direction: action.direction,
                delta_mm: action.delta_mm,
                threshold_mm: action.threshold_mm,
            });
        }
        request(gate, action.direction, inputs.now_ms, hw, sink);
    }
}
