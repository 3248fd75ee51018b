//! GateController tick-loop tests against mock hardware.

use pondgate::alarm::{AlarmKind, Severity};
use pondgate::app::commands::{AppCommand, RelayCommand};
use pondgate::app::events::AppEvent;
use pondgate::app::ports::RelayChannel;
use pondgate::automation::rules::ControlConfig;
use pondgate::config::GateConfig;
use pondgate::gate::GateState;
use pondgate::sensors::Pond;

use crate::mock_hw::{quiet_rules, MemStore, Rig};

#[test]
fn start_parks_relays_and_writes_default_rules() {
    let mut rig = Rig::new(GateConfig::default(), MemStore::default());
    rig.hw.commanded[RelayChannel::Ch4.index()] = true;
    rig.start();

    assert!(RelayChannel::ALL.iter().all(|ch| !rig.hw.is_on(*ch)));
    assert_eq!(rig.store.saves.get(), 1);
    assert_eq!(rig.store.stored(), Some(ControlConfig::default()));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Started)), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ControlConfigReloaded)), 1);
}

#[test]
fn manual_open_runs_one_full_stroke() {
    let mut rig = Rig::started(&quiet_rules());
    rig.command(AppCommand::Relay(RelayCommand::Open)).unwrap();

    assert!(rig.hw.is_on(RelayChannel::GATE_OPEN));
    assert!(rig.ctl.takeover().is_active());
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::TakeoverStarted { duration_ms: 120_000 })),
        1
    );

    rig.run_for(9_950);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);

    rig.run_for(50);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(rig.ctl.gate().position_open());
    assert!(!rig.hw.is_on(RelayChannel::GATE_OPEN));

    let lines = rig.sink.lines();
    let start = lines.iter().position(|l| l == "gate_open_start").unwrap();
    let stop = lines.iter().position(|l| l == "gate_stop").unwrap();
    assert!(start < stop);
}

#[test]
fn runaway_stroke_raises_gate_timeout() {
    let mut rig = Rig::started(&quiet_rules());
    rig.command(AppCommand::Relay(RelayCommand::Close)).unwrap();

    // A stalled loop: the next tick lands past the runaway limit.
    rig.jump(300_000);

    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(rig.ctl.gate().timeout_fault());
    assert!(!rig.hw.is_on(RelayChannel::GATE_CLOSE));
    // Runaway is not a completed stroke.
    assert!(!rig.ctl.gate().position_open());
    assert_eq!(rig.ctl.alarm().kind, Some(AlarmKind::GateTimeout));
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::AlarmRaised { kind: AlarmKind::GateTimeout })),
        1
    );
}

#[test]
fn silent_sensors_raise_timeout_and_go_offline() {
    let mut rig = Rig::started(&quiet_rules());
    rig.hw.set_level(0x01, 1_000);
    rig.hw.set_level(0x02, 1_000);

    rig.run_for(2_000);
    assert_eq!(rig.ctl.alarm().severity, Severity::Normal);
    assert!(rig.ctl.sensors().sample(Pond::Inner).online);
    assert!(rig.ctl.sensors().sample(Pond::Outer).online);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::AlarmCleared)), 1);

    rig.hw.silence(0x01);
    rig.hw.silence(0x02);
    rig.run_for(7_000);

    let t = rig.ctl.telemetry(rig.now);
    assert!(!t.sensors[0].online && !t.sensors[1].online);
    assert!(t.sensors[0].valid, "last value is kept");
    assert_eq!(t.alarm.severity, 2);
    assert_eq!(t.alarm.text, "Alarm: sensor offline or data timeout");
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::AlarmRaised { kind: AlarmKind::SensorTimeout })),
        2,
        "once at boot, once after the dropout"
    );
}

#[test]
fn forced_relay_trips_interlock() {
    let mut rig = Rig::started(&quiet_rules());
    rig.command(AppCommand::Relay(RelayCommand::Open)).unwrap();

    // CH2 stuck high on the board.
    rig.hw.forced_high[RelayChannel::GATE_CLOSE.index()] = true;
    rig.run_for(50);

    assert!(rig.ctl.gate().interlock_fault());
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(!rig.hw.commanded[RelayChannel::GATE_OPEN.index()]);
    assert_eq!(rig.ctl.alarm().kind, Some(AlarmKind::RelayInterlock));
    assert!(rig.sink.lines().iter().any(|l| l == "alarm severity=2 text=Alarm: relay interlock triggered"));
}

#[test]
fn level_jump_is_a_warning_only() {
    let mut rig = Rig::started(&quiet_rules());
    rig.hw.set_level(0x01, 1_000);
    rig.hw.set_level(0x02, 1_000);
    rig.run_for(1_000);

    rig.hw.set_level(0x01, 5_000);
    rig.run_for(2_000);

    let alarm = rig.ctl.alarm();
    assert_eq!(alarm.kind, Some(AlarmKind::LevelJump));
    assert_eq!(alarm.severity, Severity::Warning);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::AlarmRaised { kind: AlarmKind::LevelJump })),
        0
    );
}

#[test]
fn measurement_is_emitted_once_a_minute() {
    let mut rig = Rig::started(&quiet_rules());
    rig.hw.set_level(0x01, 1_200);
    rig.hw.set_level(0x02, 1_150);

    rig.run_for(59_950);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Measurement(_))), 0);
    rig.run_for(50);

    let lines: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Measurement(_)))
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        lines,
        ["inner_mm=1200 outer_mm=1150 t1_x10=215 t2_x10=215 online1=1 online2=1 valid1=1 valid2=1"]
    );
}

#[test]
fn telemetry_rounds_takeover_up() {
    let mut rig = Rig::started(&quiet_rules());
    rig.command(AppCommand::Relay(RelayCommand::Stop)).unwrap();
    rig.run_for(500);

    let t = rig.ctl.telemetry(rig.now);
    assert!(t.manual_active);
    assert_eq!(t.manual_remaining_s, 120);
    assert_eq!(t.gate_state, "stopped");
    assert!(t.open_allowed && t.close_allowed);
    assert_eq!(t.block_reason, "");
}

#[test]
fn cooldown_blocks_availability_outside_takeover() {
    let mut rig = Rig::started(&quiet_rules());
    rig.command(AppCommand::Relay(RelayCommand::Open)).unwrap();
    rig.command(AppCommand::EndManualTakeover).unwrap();

    let t = rig.ctl.telemetry(rig.now);
    assert!(!t.open_allowed);
    assert_eq!(t.block_reason, "Gate is running, repeat action blocked");

    rig.run_for(10_000);
    let t = rig.ctl.telemetry(rig.now);
    assert_eq!(t.block_reason, "Cooldown active: min action interval");

    rig.run_for(15_000);
    let t = rig.ctl.telemetry(rig.now);
    assert!(t.open_allowed && t.close_allowed);
}
