//! Mock adapters for integration tests.
//!
//! `MockHw` plays both the relay board and the level sensors: it records
//! every relay write, reads back an electrical level that tests can force
//! high behind the controller's back, and answers sensor reads from a
//! per-address table. `Rig` bundles the controller with its mocks and a
//! simulated clock.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use pondgate::app::commands::{AppCommand, CommandError};
use pondgate::app::events::AppEvent;
use pondgate::app::ports::{
    ConfigError, ControlConfigPort, EventSink, LevelReading, RelayChannel, RelayPort, SensorPort, WallClock,
};
use pondgate::app::service::GateController;
use pondgate::automation::rules::ControlConfig;
use pondgate::config::GateConfig;

/// 2024-01-01 00:00 UTC, a Monday; 08:00 local at the default UTC+8.
pub const MON_0800_LOCAL: u32 = 1_704_067_200;

// ── MockHw ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHw {
    /// Last level written per channel.
    pub commanded: [bool; 6],
    /// Channels held high electrically regardless of writes.
    pub forced_high: [bool; 6],
    pub writes: Vec<(RelayChannel, bool)>,
    /// `None` entry (or no entry) means the sensor does not answer.
    pub sensors: HashMap<u8, Option<LevelReading>>,
    pub reads: Vec<u8>,
}

impl MockHw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&mut self, sensor_id: u8, level_mm: u16) {
        self.sensors.insert(
            sensor_id,
            Some(LevelReading {
                level_mm,
                temp_x10: 215,
            }),
        );
    }

    pub fn silence(&mut self, sensor_id: u8) {
        self.sensors.insert(sensor_id, None);
    }

    pub fn is_on(&self, channel: RelayChannel) -> bool {
        self.relay_level(channel)
    }
}

impl RelayPort for MockHw {
    fn set_relay(&mut self, channel: RelayChannel, on: bool) {
        self.commanded[channel.index()] = on;
        self.writes.push((channel, on));
    }

    fn relay_level(&self, channel: RelayChannel) -> bool {
        self.commanded[channel.index()] || self.forced_high[channel.index()]
    }
}

impl SensorPort for MockHw {
    fn read_level(&mut self, sensor_id: u8) -> Option<LevelReading> {
        self.reads.push(sensor_id);
        self.sensors.get(&sensor_id).copied().flatten()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MemStore ──────────────────────────────────────────────────

/// Control-config store holding the JSON text, like the NVS blob.
#[derive(Default)]
pub struct MemStore {
    pub doc: RefCell<Option<String>>,
    pub saves: Cell<u32>,
}

impl MemStore {
    pub fn with_config(config: &ControlConfig) -> Self {
        let store = Self::default();
        *store.doc.borrow_mut() = config.to_json().ok();
        store
    }

    pub fn with_text(text: &str) -> Self {
        let store = Self::default();
        *store.doc.borrow_mut() = Some(text.to_string());
        store
    }

    pub fn stored(&self) -> Option<ControlConfig> {
        self.doc.borrow().as_deref().and_then(|t| ControlConfig::from_json(t).ok())
    }
}

impl ControlConfigPort for MemStore {
    fn load_control(&self) -> Result<ControlConfig, ConfigError> {
        let doc = self.doc.borrow();
        let text = doc.as_deref().ok_or(ConfigError::NotFound)?;
        ControlConfig::from_json(text).map_err(|_| ConfigError::Corrupted)
    }

    fn save_control_text(&self, text: &str) -> Result<(), ConfigError> {
        *self.doc.borrow_mut() = Some(text.to_string());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// ── FakeWallClock ─────────────────────────────────────────────

/// SNTP stand-in: anchored at some UTC second and advanced by the rig's
/// monotonic clock.
#[derive(Default)]
pub struct FakeWallClock {
    anchor: Cell<Option<(u32, u32)>>,
    now_ms: Cell<u32>,
}

impl FakeWallClock {
    /// Synchronise so that `utc` is the current second.
    pub fn sync(&self, utc: u32) {
        self.anchor.set(Some((utc, self.now_ms.get())));
    }

    pub fn unsync(&self) {
        self.anchor.set(None);
    }
}

impl WallClock for FakeWallClock {
    fn utc_epoch_secs(&self) -> Option<u32> {
        self.anchor
            .get()
            .map(|(utc, at)| utc + self.now_ms.get().wrapping_sub(at) / 1000)
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub ctl: GateController,
    pub hw: MockHw,
    pub wall: FakeWallClock,
    pub store: MemStore,
    pub sink: RecordingSink,
    pub now: u32,
    pub step_ms: u32,
}

impl Rig {
    pub fn new(config: GateConfig, store: MemStore) -> Self {
        let step_ms = config.control_loop_interval_ms;
        Self {
            ctl: GateController::new(config),
            hw: MockHw::new(),
            wall: FakeWallClock::default(),
            store,
            sink: RecordingSink::default(),
            now: 0,
            step_ms,
        }
    }

    /// Default tunables, given rule document, already started.
    pub fn started(control: &ControlConfig) -> Self {
        let mut rig = Self::new(GateConfig::default(), MemStore::with_config(control));
        rig.start();
        rig
    }

    pub fn start(&mut self) {
        self.ctl.start(self.now, &mut self.hw, &self.store, &mut self.sink);
    }

    pub fn tick(&mut self) {
        self.wall.now_ms.set(self.now);
        self.ctl.tick(self.now, &mut self.hw, &self.wall, &self.store, &mut self.sink);
    }

    /// Run the loop at its configured period for `ms`.
    pub fn run_for(&mut self, ms: u32) {
        let end = self.now.wrapping_add(ms);
        while (end.wrapping_sub(self.now) as i32) > 0 {
            self.now = self.now.wrapping_add(self.step_ms);
            self.tick();
        }
    }

    /// Jump the clock without running the loop, then tick once.
    pub fn jump(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
        self.tick();
    }

    pub fn command(&mut self, cmd: AppCommand) -> Result<(), CommandError> {
        self.ctl
            .handle_command(cmd, self.now, &mut self.hw, &self.store, &mut self.sink)
    }

    /// Feed a raw transport payload through the byte decoder.
    pub fn bytes(&mut self, payload: &[u8]) -> Vec<Result<(), CommandError>> {
        pondgate::app::commands::relay_commands(payload)
            .map(AppCommand::Relay)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|cmd| self.command(cmd))
            .collect()
    }
}

/// Rule document with every automation disabled.
pub fn quiet_rules() -> ControlConfig {
    let mut c = ControlConfig::default();
    for r in &mut c.daily {
        r.enabled = false;
    }
    for r in &mut c.level_diff {
        r.enabled = false;
    }
    c
}
