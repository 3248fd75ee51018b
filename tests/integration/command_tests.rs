//! Command surface tests: byte payloads, JSON bodies, channel writes and
//! rule-document updates, all routed through `GateController::handle_command`.

use pondgate::app::commands::{AppCommand, ChannelTarget, CommandError, RelayCommand};
use pondgate::app::events::AppEvent;
use pondgate::app::ports::RelayChannel;
use pondgate::automation::rules::ControlMode;
use pondgate::gate::{BlockReason, GateState};

use crate::mock_hw::{quiet_rules, Rig};

fn json(rig: &mut Rig, body: &str) -> Vec<Result<(), CommandError>> {
    AppCommand::from_json(body)
        .unwrap()
        .into_iter()
        .map(|cmd| rig.command(cmd))
        .collect()
}

#[test]
fn payload_is_processed_byte_by_byte() {
    let mut rig = Rig::started(&quiet_rules());
    let results = rig.bytes(b"x3\r\n4");

    assert_eq!(results, [Ok(()), Ok(())]);
    assert!(rig.hw.is_on(RelayChannel::Ch3));
    assert!(rig.hw.is_on(RelayChannel::Ch4));
    assert_eq!(rig.ctl.aux(), [true, true, false, false]);
    // Aux toggles never pause automation.
    assert!(!rig.ctl.takeover().is_active());

    rig.bytes(b"3");
    assert!(!rig.hw.is_on(RelayChannel::Ch3));
    assert!(rig.sink.lines().iter().any(|l| l == "relay CH3 off"));
}

#[test]
fn all_aux_on_parks_the_gate() {
    let mut rig = Rig::started(&quiet_rules());
    rig.bytes(b"1");
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);

    rig.bytes(b"7");
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    assert!(!rig.hw.is_on(RelayChannel::GATE_OPEN));
    assert!(!rig.hw.is_on(RelayChannel::GATE_CLOSE));
    assert!(RelayChannel::AUX.iter().all(|ch| rig.hw.is_on(*ch)));
    // Still the takeover window from '1'; '7' itself leaves it alone.
    assert!(rig.ctl.takeover().is_active());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::TakeoverStarted { .. })), 1);

    rig.bytes(b"8");
    assert!(RelayChannel::ALL.iter().all(|ch| !rig.hw.is_on(*ch)));
    assert_eq!(rig.ctl.aux(), [false; 4]);
}

#[test]
fn manual_reverse_stops_then_starts() {
    let mut rig = Rig::started(&quiet_rules());
    rig.bytes(b"1");
    rig.run_for(2_000);
    let results = rig.bytes(b"2");

    assert_eq!(results, [Ok(())]);
    assert_eq!(rig.ctl.gate().state(), GateState::Closing);
    assert!(!rig.hw.is_on(RelayChannel::GATE_OPEN));
    assert!(rig.hw.is_on(RelayChannel::GATE_CLOSE));
    let lines = rig.sink.lines();
    let tail: Vec<_> = lines.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, ["gate_stop", "gate_close_start"]);
}

#[test]
fn repeat_direction_is_refused_even_in_takeover() {
    let mut rig = Rig::started(&quiet_rules());
    rig.bytes(b"2");
    let results = rig.bytes(b"2");

    assert_eq!(results, [Err(CommandError::Blocked(BlockReason::AlreadyClosing))]);
    assert_eq!(rig.ctl.gate().last_rejection(), Some(BlockReason::AlreadyClosing));
    assert!(rig.sink.lines().iter().any(|l| l == "gate_close_blocked: Gate is already closing"));
}

#[test]
fn toggle_on_gate_channel_is_malformed() {
    let mut rig = Rig::started(&quiet_rules());
    let r = rig.command(AppCommand::Relay(RelayCommand::ToggleAux(RelayChannel::Ch1)));
    assert_eq!(r, Err(CommandError::Malformed));
    assert!(!rig.hw.is_on(RelayChannel::Ch1));
}

#[test]
fn channel_writes_are_normalized() {
    let mut rig = Rig::started(&quiet_rules());

    json(&mut rig, r#"{"data": {"CH1": 1}}"#);
    assert_eq!(rig.ctl.gate().state(), GateState::Opening);

    json(&mut rig, r#"{"data": {"CH1": 0}}"#);
    assert_eq!(rig.ctl.gate().state(), GateState::Stopped);
    let stops = rig.sink.count(|e| matches!(e, AppEvent::GateStopped));

    // Already off: nothing to do.
    json(&mut rig, r#"{"data": {"CH1": false}}"#);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::GateStopped)), stops);

    // Aux writes toggle only on change.
    json(&mut rig, r#"{"data": {"ch5": true}}"#);
    json(&mut rig, r#"{"data": {"CH5": 1}}"#);
    assert!(rig.hw.is_on(RelayChannel::Ch5));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::AuxRelay { .. })), 1);
}

#[test]
fn all_channel_key_maps_to_seven_and_eight() {
    let mut rig = Rig::started(&quiet_rules());

    json(&mut rig, r#"{"data": {"ALL": 1}}"#);
    assert_eq!(rig.ctl.aux(), [true; 4]);
    json(&mut rig, r#"{"data": {"CH7": 1}}"#);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::AllAuxOn)), 1);

    json(&mut rig, r#"{"data": {"ALL": 0}}"#);
    assert_eq!(rig.ctl.aux(), [false; 4]);
    json(&mut rig, r#"{"data": {"ALL": 0}}"#);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::AllOff)), 1);
}

#[test]
fn unknown_channel_key_is_malformed() {
    assert_eq!(AppCommand::from_json(r#"{"data": {"CH9": 1}}"#), Err(CommandError::Malformed));
    assert_eq!(
        AppCommand::from_json(r#"{"data": {"ALL": 1}}"#),
        Ok(vec![AppCommand::SetChannel {
            target: ChannelTarget::All,
            on: true
        }])
    );
}

#[test]
fn latch_and_enable_auto() {
    let mut rig = Rig::started(&quiet_rules());
    json(&mut rig, r#"{"cmd": "auto_latch_off"}"#);

    let t = rig.ctl.telemetry(rig.now);
    assert!(t.auto_latched && !t.auto_enabled);
    assert!(!rig.ctl.takeover().automation_allowed());

    json(&mut rig, r#"{"cmd": "auto_on"}"#);
    assert!(rig.ctl.takeover().automation_allowed());
    assert!(rig.sink.lines().iter().any(|l| l == "auto latched off"));
    assert!(rig.sink.lines().iter().any(|l| l == "auto enabled"));
}

#[test]
fn invalid_rule_document_is_not_stored() {
    let mut rig = Rig::started(&quiet_rules());
    let before = rig.store.doc.borrow().clone();
    let saves = rig.store.saves.get();

    let r = rig.command(AppCommand::UpdateControlConfig("{\"mode\": ".into()));
    assert_eq!(r, Err(CommandError::InvalidDocument));
    assert_eq!(*rig.store.doc.borrow(), before);
    assert_eq!(rig.store.saves.get(), saves);
    assert!(rig.ctl.automation().config().is_some());
}

#[test]
fn rule_document_is_stored_as_received() {
    let mut rig = Rig::started(&quiet_rules());
    let body = r#"{"mode":"turbo","site":"pond 3","leveldiff":[{"en":true,"open_mm":-2}]}"#;

    rig.command(AppCommand::UpdateControlConfig(body.into())).unwrap();
    let text = rig.store.doc.borrow().clone().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["mode"], "turbo");
    assert_eq!(doc["site"], "pond 3");
    assert!(text.contains('\n'));

    let loaded = rig.store.stored().unwrap();
    assert_eq!(loaded.mode, ControlMode::Mixed);
    assert_eq!(loaded.level_diff[0].open_threshold_mm, -2);
}

#[test]
fn rule_document_update_reloads_on_next_tick() {
    let mut rig = Rig::started(&quiet_rules());
    let body = r#"{
        "mode": "cycle",
        "cycle": [{ "en": true, "steps": [{ "state": "close", "min": 1 }] }]
    }"#;
    rig.run_for(15_000);

    rig.command(AppCommand::UpdateControlConfig(body.into())).unwrap();
    assert!(rig.ctl.automation().config().is_none());
    assert_eq!(rig.store.stored().map(|c| c.mode), Some(ControlMode::Cycle));

    rig.run_for(50);
    assert_eq!(rig.ctl.automation().config().map(|c| c.mode), Some(ControlMode::Cycle));
    assert_eq!(rig.ctl.gate().state(), GateState::Closing);
    assert!(rig.sink.lines().iter().any(|l| l == "cycle start step=0 state=close dur_ms=60000"));
}
