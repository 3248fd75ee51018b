//! Gate controller: the hexagonal core.
//!
//! [`GateController`] owns every stateful component and drives them in a
//! fixed order once per control-loop tick. All I/O flows through port
//! traits injected at call sites, so the whole controller runs against
//! mock adapters in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────────┐ ──▶ EventSink
//!  WallClock  ──▶ │          GateController          │
//!                 │ sensors · takeover · automation  │
//!  RelayPort  ◀── │ gate · interlock check · alarms  │ ◀── ControlConfigPort
//!                 └──────────────────────────────────┘
//! ```
//!
//! Tick order:
//!
//! 1. poll one sensor (alternating), record jump/range warnings
//! 2. expire the manual takeover window
//! 3. automation
//! 4. gate stroke supervision (completion, runaway watchdog)
//! 5. electrical interlock self-check
//! 6. availability recompute
//! 7. alarm recompute and transition logging
//! 8. periodic measurement / level lines

use log::{debug, info, warn};

use crate::alarm::{AlarmAggregator, AlarmState};
use crate::automation::rules::ControlConfig;
use crate::automation::{AutomationEngine, AutomationInputs};
use crate::config::GateConfig;
use crate::gate::GateActuator;
use crate::sensors::{Pond, SensorHub};
use crate::takeover::ManualOverride;

use super::commands::{AppCommand, ChannelTarget, CommandError, RelayCommand};
use super::events::{AlarmTelemetry, AppEvent, MeasurementData, SensorTelemetry, TelemetryData};
use super::ports::{ControlConfigPort, EventSink, RelayChannel, RelayPort, SensorPort, WallClock};

// ───────────────────────────────────────────────────────────────
// GateController
// ───────────────────────────────────────────────────────────────

pub struct GateController {
    config: GateConfig,
    sensors: SensorHub,
    takeover: ManualOverride,
    automation: AutomationEngine,
    gate: GateActuator,
    alarms: AlarmAggregator,
    /// CH3..CH6 commanded levels.
    aux: [bool; 4],
    measure_log: Interval,
    level_log: Interval,
}

impl GateController {
    /// Construct the controller. Call [`start`](Self::start) before the
    /// first tick.
    pub fn new(config: GateConfig) -> Self {
        Self {
            sensors: SensorHub::new(&config),
            takeover: ManualOverride::new(&config),
            automation: AutomationEngine::new(),
            gate: GateActuator::new(&config),
            alarms: AlarmAggregator::new(&config),
            aux: [false; 4],
            measure_log: Interval::new(config.measure_log_interval_ms),
            level_log: Interval::new(config.level_log_interval_ms),
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive every relay low, load the rule document, and publish the
    /// initial availability and alarm state.
    pub fn start(
        &mut self,
        now_ms: u32,
        hw: &mut impl RelayPort,
        store: &impl ControlConfigPort,
        sink: &mut impl EventSink,
    ) {
        for ch in RelayChannel::ALL {
            hw.set_relay(ch, false);
        }
        self.aux = [false; 4];
        self.automation.ensure_loaded(store, sink);
        self.gate.hold_off(now_ms);
        self.gate.refresh_availability(now_ms, self.takeover.is_active());
        self.evaluate_alarms(now_ms, sink);
        self.measure_log.arm(now_ms);
        self.level_log.arm(now_ms);
        sink.emit(&AppEvent::Started);
        info!(
            "GateController started (auto={}, stroke={}s, cooldown={}s)",
            self.takeover.auto_enabled(),
            self.config.action_duration_s,
            self.config.min_action_interval_s
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// `hw` satisfies **both** [`SensorPort`] and [`RelayPort`]; this avoids
    /// a double mutable borrow while keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u32,
        hw: &mut (impl SensorPort + RelayPort),
        clock: &impl WallClock,
        store: &impl ControlConfigPort,
        sink: &mut impl EventSink,
    ) {
        // 1. Sensors
        if let Some(outcome) = self.sensors.poll(now_ms, hw) {
            if let Some(flags) = outcome.accepted {
                if flags.level_jump {
                    warn!("sensors: {:?} level jump", outcome.pond);
                    self.alarms.record_level_jump(now_ms);
                }
                if flags.out_of_range {
                    warn!("sensors: {:?} level out of range", outcome.pond);
                    self.alarms.record_level_out_of_range(now_ms);
                }
            }
        }

        // 2. Takeover expiry
        if self.takeover.tick(now_ms) {
            info!("takeover window expired, automation resumes");
        }
        let manual = self.takeover.is_active();

        // 3. Automation
        let (inner_mm, outer_mm) = self.sensors.levels();
        let inputs = AutomationInputs {
            now_ms,
            utc_epoch_secs: clock.utc_epoch_secs(),
            inner_mm,
            outer_mm,
            automation_allowed: self.takeover.automation_allowed(),
        };
        self.automation.tick(&inputs, &mut self.gate, store, hw, sink);

        // 4. Stroke supervision
        self.gate.tick(now_ms, manual, hw, sink);

        // 5. Interlock self-check against the electrical levels
        let relays = self.gate.relays();
        let ch1 = relays.open || hw.relay_level(RelayChannel::GATE_OPEN);
        let ch2 = relays.close || hw.relay_level(RelayChannel::GATE_CLOSE);
        if ch1 && ch2 {
            self.gate.trip_interlock(now_ms, manual, hw, sink);
        }

        // 6. Availability
        self.gate.refresh_availability(now_ms, manual);

        // 7. Alarms
        self.evaluate_alarms(now_ms, sink);

        // 8. Periodic lines
        if self.measure_log.due(now_ms) {
            sink.emit(&AppEvent::Measurement(self.measurement()));
        }
        if self.level_log.due(now_ms) {
            let (i, o) = (self.sensors.sample(Pond::Inner), self.sensors.sample(Pond::Outer));
            debug!(
                "level inner={}mm ({}) outer={}mm ({}) t1={} t2={}",
                i.level_mm,
                if i.online { "online" } else { "offline" },
                o.level_mm,
                if o.online { "online" } else { "offline" },
                i.temp_x10,
                o.temp_x10
            );
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (front panel, HTTP, MQTT, BLE, serial).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u32,
        hw: &mut impl RelayPort,
        store: &impl ControlConfigPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let result = match cmd {
            AppCommand::Relay(rc) => self.apply_relay(rc, now_ms, hw, sink),
            AppCommand::SetChannel { target, on } => match self.normalize_channel(target, on) {
                Some(rc) => self.apply_relay(rc, now_ms, hw, sink),
                None => Ok(()),
            },
            AppCommand::EnableAuto => {
                self.takeover.enable_auto();
                sink.emit(&AppEvent::AutoEnabled);
                Ok(())
            }
            AppCommand::PauseAuto => {
                self.pause_automation(now_ms, sink);
                Ok(())
            }
            AppCommand::LatchAutoOff => {
                self.takeover.latch_auto_off();
                sink.emit(&AppEvent::AutoLatchedOff);
                Ok(())
            }
            AppCommand::EndManualTakeover => {
                self.takeover.end_takeover();
                sink.emit(&AppEvent::TakeoverEnded);
                Ok(())
            }
            AppCommand::UpdateControlConfig(body) => self.update_control_config(&body, store),
            AppCommand::ReloadControlConfig => {
                self.automation.request_reload();
                info!("control config reload requested");
                Ok(())
            }
        };
        self.gate.refresh_availability(now_ms, self.takeover.is_active());
        result
    }

    /// Execute one command from the relay byte space.
    fn apply_relay(
        &mut self,
        cmd: RelayCommand,
        now_ms: u32,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        if cmd.is_gate_command() {
            self.pause_automation(now_ms, sink);
        }
        let manual = self.takeover.is_active();

        match cmd {
            RelayCommand::Stop => self.gate.stop(now_ms, manual, hw, sink),
            RelayCommand::Open => self.gate.open(now_ms, manual, hw, sink)?,
            RelayCommand::Close => self.gate.close(now_ms, manual, hw, sink)?,
            RelayCommand::ToggleAux(ch) => {
                let Some(i) = ch.aux_index() else {
                    return Err(CommandError::Malformed);
                };
                let on = !self.aux[i];
                hw.set_relay(ch, on);
                self.aux[i] = on;
                sink.emit(&AppEvent::AuxRelay { channel: ch, on });
            }
            RelayCommand::AllAuxOn => {
                self.gate.park_relays(now_ms, manual, hw, sink);
                self.set_all_aux(true, hw);
                sink.emit(&AppEvent::AllAuxOn);
            }
            RelayCommand::AllOff => {
                self.gate.stop(now_ms, manual, hw, sink);
                self.set_all_aux(false, hw);
                sink.emit(&AppEvent::AllOff);
            }
        }
        Ok(())
    }

    /// Map a level-style channel write onto the relay byte space. `None`
    /// when the write would not change anything.
    fn normalize_channel(&self, target: ChannelTarget, on: bool) -> Option<RelayCommand> {
        let relays = self.gate.relays();
        match target {
            ChannelTarget::Relay(RelayChannel::Ch1) if on => Some(RelayCommand::Open),
            ChannelTarget::Relay(RelayChannel::Ch1) => relays.open.then_some(RelayCommand::Stop),
            ChannelTarget::Relay(RelayChannel::Ch2) if on => Some(RelayCommand::Close),
            ChannelTarget::Relay(RelayChannel::Ch2) => relays.close.then_some(RelayCommand::Stop),
            ChannelTarget::Relay(ch) => {
                let i = ch.aux_index()?;
                (self.aux[i] != on).then_some(RelayCommand::ToggleAux(ch))
            }
            ChannelTarget::All => {
                if on {
                    (!self.aux.iter().all(|a| *a)).then_some(RelayCommand::AllAuxOn)
                } else {
                    let any_on = relays.open || relays.close || self.aux.iter().any(|a| *a);
                    any_on.then_some(RelayCommand::AllOff)
                }
            }
        }
    }

    fn pause_automation(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.takeover.pause_by_manual_takeover(now_ms);
        sink.emit(&AppEvent::TakeoverStarted {
            duration_ms: self.takeover.duration_ms(),
        });
    }

    /// Validate by parsing, persist the document as received (pretty
    /// printed), reload next tick.
    fn update_control_config(&mut self, body: &str, store: &impl ControlConfigPort) -> Result<(), CommandError> {
        let parsed = ControlConfig::from_json(body).map_err(|e| {
            warn!("control config rejected: {}", e);
            CommandError::InvalidDocument
        })?;
        let text = serde_json::from_str::<serde_json::Value>(body)
            .and_then(|doc| serde_json::to_string_pretty(&doc))
            .map_err(|_| CommandError::InvalidDocument)?;
        store.save_control_text(&text).map_err(CommandError::Storage)?;
        self.automation.request_reload();
        info!("control config updated (mode={})", parsed.mode.as_str());
        Ok(())
    }

    fn set_all_aux(&mut self, on: bool, hw: &mut impl RelayPort) {
        for ch in RelayChannel::AUX {
            hw.set_relay(ch, on);
        }
        self.aux = [on; 4];
    }

    fn evaluate_alarms(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.alarms.evaluate(
            now_ms,
            self.gate.interlock_fault(),
            self.gate.timeout_fault(),
            self.sensors.any_stale(now_ms),
        );
        self.alarms.log_transitions(sink);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot. Reading it changes nothing.
    pub fn telemetry(&self, now_ms: u32) -> TelemetryData {
        let sensor = |pond: Pond| {
            let s = self.sensors.sample(pond);
            SensorTelemetry {
                mm: s.level_mm,
                valid: s.has_value,
                online: s.online,
                temp_x10: s.temp_x10,
                temp_valid: s.has_temp,
            }
        };
        let availability = self.gate.availability();
        let alarm = self.alarms.state();
        let relays = self.gate.relays();

        TelemetryData {
            sensors: [sensor(Pond::Inner), sensor(Pond::Outer)],
            gate_state: self.gate.state().as_str(),
            position_open: self.gate.position_open(),
            auto_enabled: self.takeover.auto_enabled(),
            auto_latched: self.takeover.auto_latched(),
            manual_active: self.takeover.is_active(),
            manual_remaining_s: self.takeover.remaining_secs(now_ms),
            relay1: relays.open,
            relay2: relays.close,
            aux: self.aux,
            open_allowed: availability.open_allowed,
            close_allowed: availability.close_allowed,
            block_reason: availability.reason.map_or("", |r| r.as_str()),
            alarm: AlarmTelemetry {
                active: alarm.active(),
                severity: alarm.severity.level(),
                text: alarm.text(),
            },
        }
    }

    fn measurement(&self) -> MeasurementData {
        let (i, o) = (self.sensors.sample(Pond::Inner), self.sensors.sample(Pond::Outer));
        MeasurementData {
            inner_mm: i.level_mm,
            outer_mm: o.level_mm,
            inner_temp_x10: i.temp_x10,
            outer_temp_x10: o.temp_x10,
            online: [i.online, o.online],
            valid: [i.has_value, o.has_value],
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn gate(&self) -> &GateActuator {
        &self.gate
    }

    pub fn takeover(&self) -> &ManualOverride {
        &self.takeover
    }

    pub fn sensors(&self) -> &SensorHub {
        &self.sensors
    }

    pub fn automation(&self) -> &AutomationEngine {
        &self.automation
    }

    pub fn alarm(&self) -> AlarmState {
        self.alarms.state()
    }

    pub fn aux(&self) -> [bool; 4] {
        self.aux
    }
}

// ───────────────────────────────────────────────────────────────
// Interval
// ───────────────────────────────────────────────────────────────

/// Wrapping-safe periodic timer.
struct Interval {
    period_ms: u32,
    last_ms: Option<u32>,
}

impl Interval {
    const fn new(period_ms: u32) -> Self {
        Self { period_ms, last_ms: None }
    }

    fn arm(&mut self, now_ms: u32) {
        self.last_ms = Some(now_ms);
    }

    /// `true` once per period; re-arms itself.
    fn due(&mut self, now_ms: u32) -> bool {
        if self
            .last_ms
            .is_some_and(|last| now_ms.wrapping_sub(last) < self.period_ms)
        {
            return false;
        }
        self.last_ms = Some(now_ms);
        true
    }
}
