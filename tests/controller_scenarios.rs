//! End-to-end automation scenarios: the controller, its rule document and
//! a simulated wall clock, run tick by tick at the loop period.

#[path = "integration/mock_hw.rs"]
mod mock_hw;

use pondgate::app::commands::{AppCommand, RelayCommand};
use pondgate::app::events::AppEvent;
use pondgate::app::ports::RelayChannel;
use pondgate::automation::rules::{ControlConfig, DailyRule, ALL_DAYS};
use pondgate::config::GateConfig;
use pondgate::gate::{BlockReason, GateDirection, GateState};

use mock_hw::{quiet_rules, MemStore, Rig, MON_0800_LOCAL};

fn level_diff_rules() -> ControlConfig {
    let mut c = quiet_rules();
    c.level_diff[0].enabled = true;
    c
}

fn daily_fired(rig: &Rig) -> usize {
    rig.sink.count(|e| matches!(e, AppEvent::DailyFired { .. }))
}

#[test]
fn manual_pause_swallows_the_daily_minute() {
    let mut rig = Rig::started(&ControlConfig::default());
    rig.wall.sync(MON_0800_LOCAL - 60);
    rig.command(AppCommand::PauseAuto).unwrap();

    // 08:00 passes while the 120 s window is open; 08:01 is not caught up.
    rig.run_for(180_000);

    assert_eq!(daily_fired(&rig), 0);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(!rig.hw.writes.contains(&(RelayChannel::GATE_OPEN, true)));
}

#[test]
fn daily_open_fires_once_in_its_minute() {
    let mut rig = Rig::started(&ControlConfig::default());
    rig.wall.sync(MON_0800_LOCAL - 30);

    rig.run_for(30_000);
    assert_eq!(daily_fired(&rig), 1);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
    assert!(rig.sink.lines().iter().any(|l| l == "daily[0] fire open 08:00"));

    // Stroke ends and the cooldown lapses inside the same minute.
    rig.run_for(29_950);
    assert_eq!(daily_fired(&rig), 1);
    assert!(rig.ctl.gate().position_open());
}

#[test]
fn unsynced_clock_never_fires_daily() {
    let mut rig = Rig::started(&ControlConfig::default());
    rig.run_for(120_000);
    assert_eq!(daily_fired(&rig), 0);
}

#[test]
fn same_minute_close_is_refused_by_interlock() {
    let mut rules = quiet_rules();
    rules.daily[0] = DailyRule {
        enabled: true,
        dow_mask: ALL_DAYS,
        open_enabled: true,
        open_ms: 8 * 3_600_000,
        close_enabled: true,
        close_ms: 8 * 3_600_000,
    };
    let mut rig = Rig::started(&rules);
    rig.run_for(15_000);
    rig.wall.sync(MON_0800_LOCAL);
    rig.run_for(50);

    assert_eq!(daily_fired(&rig), 2);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
    assert_eq!(rig.ctl.gate().last_rejection(), Some(BlockReason::OpenRelayActive));
    assert_eq!(rig.ctl.gate().availability().reason, Some(BlockReason::GateRunning));
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::GateBlocked {
                direction: GateDirection::Close,
                reason: BlockReason::OpenRelayActive
            }
        )),
        1
    );
    assert!(!rig.hw.is_on(RelayChannel::GATE_CLOSE));
}

#[test]
fn level_difference_opens_then_closes_after_cooldown() {
    let mut rig = Rig::started(&level_diff_rules());
    rig.hw.set_level(0x01, 900);
    rig.hw.set_level(0x02, 1_000);

    // inner - outer = -100 once both answer, but the boot hold-off runs first.
    rig.run_for(14_950);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(rig.sink.count(|e| matches!(
        e,
        AppEvent::GateBlocked { direction: GateDirection::Open, reason: BlockReason::Cooldown }
    )) >= 1);

    rig.run_for(50);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
    assert!(rig.sink.lines().iter().any(|l| l == "leveldiff[0] open delta=-100 <= -1"));

    rig.run_for(10_000);
    assert!(rig.ctl.gate().position_open());

    rig.hw.set_level(0x01, 1_100);
    rig.run_for(5_000);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped, "cooldown holds the close");
    assert!(rig.sink.count(|e| matches!(
        e,
        AppEvent::GateBlocked { direction: GateDirection::Close, reason: BlockReason::Cooldown }
    )) >= 1);

    rig.run_for(11_000);
    assert_eq!(rig.ctl.gate().state(), GateState::Closing);
    assert!(rig.sink.lines().iter().any(|l| l == "leveldiff[0] close delta=100 >= 0"));
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::LevelDiffTriggered { direction: GateDirection::Close, .. })),
        1
    );
}

#[test]
fn automation_waits_one_cooldown_after_start() {
    let mut rig = Rig::started(&ControlConfig::default());
    rig.wall.sync(MON_0800_LOCAL);

    rig.run_for(14_950);
    assert_eq!(daily_fired(&rig), 1);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert_eq!(rig.ctl.gate().last_rejection(), Some(BlockReason::Cooldown));
    assert!(!rig.hw.writes.contains(&(RelayChannel::GATE_OPEN, true)));

    // A manual command is not held.
    rig.command(AppCommand::Relay(RelayCommand::Open)).unwrap();
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
}

#[test]
fn takeover_expiry_resumes_automation_silently() {
    let mut rig = Rig::started(&level_diff_rules());
    rig.hw.set_level(0x01, 900);
    rig.hw.set_level(0x02, 1_000);
    rig.command(AppCommand::PauseAuto).unwrap();

    rig.run_for(119_950);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);

    rig.run_for(50);
    assert!(!rig.ctl.takeover().is_active());
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::TakeoverEnded)), 0);
}

#[test]
fn latched_automation_waits_for_enable() {
    let mut rig = Rig::started(&level_diff_rules());
    rig.hw.set_level(0x01, 900);
    rig.hw.set_level(0x02, 1_000);
    rig.command(AppCommand::LatchAutoOff).unwrap();

    rig.run_for(200_000);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);

    rig.command(AppCommand::EnableAuto).unwrap();
    rig.run_for(50);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);
}

#[test]
fn stroke_completes_across_counter_wrap() {
    let mut rig = Rig::new(GateConfig::default(), MemStore::with_config(&quiet_rules()));
    rig.now = u32::MAX - 4_000;
    rig.start();
    rig.command(AppCommand::Relay(RelayCommand::Close)).unwrap();

    rig.run_for(9_950);
    assert_eq!(rig.ctl.gate().state(), GateState::Closing);
    rig.run_for(50);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(!rig.ctl.gate().timeout_fault());
    assert!(rig.ctl.gate().in_cooldown(rig.now));
}

#[test]
fn cycle_repeats_its_single_step() {
    let body = r#"{"mode": "cycle", "cycle": [{"en": true, "steps": [{"state": "close", "dur_ms": 30000}]}]}"#;
    let mut rig = Rig::new(GateConfig::default(), MemStore::with_text(body));
    rig.start();

    rig.run_for(50);
    rig.run_for(30_000);

    let steps: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::CycleStep { started, step, .. } => Some((*started, *step)),
            _ => None,
        })
        .collect();
    assert_eq!(steps, [(true, 0), (false, 0)]);
    assert_eq!(rig.ctl.gate().state(), GateState::Closing);
}
