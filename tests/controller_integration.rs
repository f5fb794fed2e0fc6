//! Integration tests for the prop controller
//!
//! Drives PropController<SimBoard, SimTransport> end to end: physical
//! inputs in, published messages out.

use prop_runtime::config::PropConfig;
use prop_runtime::core::PropController;
use prop_runtime::hal::{Level, SimBoard, SimTransport};
use prop_runtime::types::{ChangeSource, Command, Millis, OutputState, PropPhase};
use serde_json::Value;

const RFID: u8 = 12;
const MAGNET: u8 = 27;
const MAGLOCK: u8 = 25;

const STATUS: &str = "ey/default/magie/prop/magie_roueFortune/status";
const EVENT: &str = "ey/default/magie/prop/magie_roueFortune/event";
const CMD: &str = "ey/default/magie/prop/magie_roueFortune/cmd";
const LWT: &str = "ey/default/magie/prop/magie_roueFortune/lwt";

type Prop = PropController<SimBoard, SimTransport>;

fn create_prop() -> Prop {
    let mut prop = PropController::new(PropConfig::roue_fortune(), SimBoard::new(), SimTransport::new())
        .expect("preset is valid");
    prop.begin();
    prop
}

fn payloads(prop: &Prop, topic: &str) -> Vec<Value> {
    prop.transport()
        .published_on(topic)
        .map(|m| m.json().expect("published JSON"))
        .collect()
}

fn send(prop: &mut Prop, payload: &str) {
    prop.transport_mut().inject(CMD, payload);
    prop.run_for(5);
}

#[test]
fn test_boot_present_sensor_must_cycle_to_count() {
    let mut prop = create_prop();

    // rfid1 reads HIGH through its pull-up: present from boot
    let rfid = prop.sensors().state_by_id("rfid1").unwrap();
    assert!(!rfid.armed);
    assert!(!rfid.present);

    prop.run_for(500);
    assert!(!prop.is_solved());
    assert!(payloads(&prop, EVENT).is_empty());

    prop.board_mut().set_level(RFID, Level::Low);
    prop.run_for(50);
    assert!(prop.sensors().state_by_id("rfid1").unwrap().armed);
    assert!(!prop.is_solved());

    prop.board_mut().set_level(RFID, Level::High);
    prop.run_for(50);
    assert!(prop.is_solved());
    assert_eq!(prop.state().last_change_source, ChangeSource::Player);

    let events = payloads(&prop, EVENT);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "rfid_present");
    assert_eq!(events[0]["source"], "player");

    let last = payloads(&prop, STATUS).pop().unwrap();
    assert_eq!(last["solved"], true);
    assert_eq!(last["lastChangeSource"], "player");
    assert_eq!(last["details"]["sensors"][0]["triggered"], true);
}

#[test]
fn test_gm_force_solved_message() {
    let mut prop = create_prop();
    prop.transport_mut().clear_published();

    send(&mut prop, r#"{"type":"cmd","command":"force_solved","source":"gm"}"#);

    assert!(prop.is_solved());
    assert!(prop.state().override_active);
    assert_eq!(prop.state().last_change_source, ChangeSource::Gm);

    let events = payloads(&prop, EVENT);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "force_solved");
    assert_eq!(events[0]["source"], "gm");

    let status: Vec<_> = prop.transport().published_on(STATUS).collect();
    assert_eq!(status.len(), 1);
    assert!(status[0].retain);
    let json = status[0].json().unwrap();
    assert_eq!(json["override"], true);
    assert_eq!(json["solved"], true);
}

#[test]
fn test_reconnect_announces_exactly_once() {
    let mut prop = create_prop();
    prop.force_solved(true, ChangeSource::Device);
    prop.run_for(100);

    prop.transport_mut().set_broker_available(false);
    prop.run_for(1000);
    assert!(!prop.bridge().is_connected());

    // will published by the broker on our behalf
    let will = prop.transport().published().last().unwrap().clone();
    assert!(will.from_will);
    assert_eq!(will.topic, LWT);
    assert_eq!(will.json().unwrap()["online"], false);

    prop.transport_mut().clear_published();
    prop.transport_mut().set_broker_available(true);
    prop.run_for(10_000);
    assert!(prop.bridge().is_connected());

    let status: Vec<_> = prop.transport().published_on(STATUS).collect();
    assert_eq!(status.len(), 1);
    assert!(status[0].retain);
    let json = status[0].json().unwrap();
    assert_eq!(json["solved"], true);
    assert_eq!(json["lastChangeSource"], "device");

    let online = payloads(&prop, LWT);
    assert_eq!(online.len(), 1);
    assert_eq!(online[0]["online"], true);
}

#[test]
fn test_link_loss_recovers_on_retry_interval() {
    let mut prop = create_prop();
    prop.transport_mut().set_link_available(false);
    prop.run_for(100);
    let attempts = prop.transport().link_attempts();

    prop.transport_mut().set_link_available(true);
    prop.run_for(4000);
    // still waiting out the retry interval
    assert!(!prop.bridge().is_connected());
    prop.run_for(2000);
    assert!(prop.bridge().is_connected());
    assert_eq!(prop.transport().link_attempts(), attempts + 1);
}

#[test]
fn test_reset_clears_session_state() {
    let mut prop = create_prop();
    prop.board_mut().set_level(MAGNET, Level::Low);
    prop.dispatch(Command::SetOutput { sensor_id: "rfid1".into(), source: ChangeSource::Gm });
    prop.force_solved(true, ChangeSource::Gm);
    prop.run_for(50);
    prop.transport_mut().clear_published();

    send(&mut prop, "reset");

    let state = prop.state();
    assert!(!state.solved_latched);
    assert!(!state.override_active);
    assert_eq!(state.last_change_source, ChangeSource::Device);
    for (_, sensor) in prop.sensors().iter() {
        assert!(!sensor.event_sent);
        assert!(!sensor.force_locked);
        assert!(!sensor.present);
    }
    assert_eq!(prop.outputs().state(0), Some(OutputState::Armed));
    assert_eq!(prop.board().output_level(MAGLOCK), Some(Level::High));
    assert_eq!(prop.phase(), PropPhase::ResetFeedback);

    let status = payloads(&prop, STATUS);
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["solved"], false);
    assert_eq!(status[0]["override"], false);
}

#[test]
fn test_sensors_ignored_after_reset() {
    let mut prop = create_prop();
    prop.board_mut().set_level(MAGNET, Level::Low);
    prop.run_for(50);
    assert!(prop.is_solved());

    prop.reset();
    // magnet still in place, but the ignore window holds it off
    prop.run_for(1900);
    assert!(!prop.is_solved());
    prop.run_for(200);
    assert!(prop.is_solved());
    assert_eq!(prop.phase(), PropPhase::Solved);
}

#[test]
fn test_force_unsolve_is_noop() {
    let mut prop = create_prop();
    prop.force_solved(true, ChangeSource::Gm);
    prop.transport_mut().clear_published();

    send(&mut prop, r#"{"type":"setSolved","value":false}"#);
    prop.force_solved(false, ChangeSource::Device);

    assert!(prop.is_solved());
    assert!(prop.state().override_active);
    assert!(prop.transport().published().is_empty());
}

#[test]
fn test_output_lifecycle() {
    let mut prop = create_prop();
    assert_eq!(prop.outputs().state(0), Some(OutputState::Inactive));
    assert_eq!(prop.board().output_level(MAGLOCK), Some(Level::Low));

    send(&mut prop, r#"{"type":"cmd","command":"arm"}"#);
    assert_eq!(prop.outputs().state(0), Some(OutputState::Armed));
    let armed = payloads(&prop, STATUS).pop().unwrap();
    assert_eq!(armed["details"]["outputs"][0]["state"], "armed");
    assert_eq!(armed["solved"], false);

    prop.board_mut().set_level(MAGNET, Level::Low);
    prop.run_for(50);
    assert_eq!(prop.outputs().state(0), Some(OutputState::Released));
    assert_eq!(prop.board().output_level(MAGLOCK), Some(Level::Low));

    // arm re-locks even after a solve
    send(&mut prop, r#"{"type":"cmd","command":"arm"}"#);
    assert_eq!(prop.outputs().state(0), Some(OutputState::Armed));
    assert_eq!(prop.board().output_level(MAGLOCK), Some(Level::High));
    let relocked = payloads(&prop, STATUS).pop().unwrap();
    assert_eq!(relocked["details"]["outputs"][0]["state"], "armed");

    prop.reset();
    assert_eq!(prop.outputs().state(0), Some(OutputState::Armed));
}

#[test]
fn test_set_output_latches_on_next_tick() {
    let mut prop = create_prop();
    prop.run_for(50);

    prop.set_output("rfid1", ChangeSource::Gm);
    assert!(!prop.is_solved());
    assert!(prop.sensors().state_by_id("rfid1").unwrap().present);

    let events = payloads(&prop, EVENT);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "rfid_present");
    assert_eq!(events[0]["source"], "gm");

    prop.run_for(5);
    assert!(prop.is_solved());
}

#[test]
fn test_set_output_event_is_always_gm() {
    let mut prop = create_prop();
    prop.run_for(50);
    prop.transport_mut().clear_published();

    send(&mut prop, r#"{"type":"cmd","command":"set_output","sensorId":"rfid1","source":"device"}"#);

    let events = payloads(&prop, EVENT);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "rfid_present");
    assert_eq!(events[0]["source"], "gm");
}

#[test]
fn test_set_output_unknown_sensor() {
    let mut prop = create_prop();
    prop.transport_mut().clear_published();
    send(&mut prop, r#"{"type":"cmd","command":"set_output","sensorId":"laser9"}"#);

    assert!(!prop.is_solved());
    assert!(prop.transport().published().is_empty());
}

#[test]
fn test_broadcast_commands_are_honored() {
    let mut prop = create_prop();
    prop.transport_mut().inject("ey/default/magie/all/cmd", r#"{"type":"cmd","command":"force_solved","source":"device"}"#);
    prop.run_for(5);

    assert!(prop.is_solved());
    assert!(!prop.state().override_active);
    assert_eq!(prop.state().last_change_source, ChangeSource::Device);
}

#[test]
fn test_offline_prop_still_solves() {
    let mut prop = PropController::new(PropConfig::roue_fortune(), SimBoard::new(), SimTransport::offline()).unwrap();
    prop.begin();

    prop.board_mut().set_level(MAGNET, Level::Low);
    prop.run_for(50);
    assert!(prop.is_solved());
    assert!(prop.transport().published().is_empty());
    assert!(!prop.snapshot().online);
}

#[test]
fn test_clock_wraparound() {
    let board = SimBoard::starting_at(Millis(u32::MAX - 30));
    let mut prop = PropController::new(PropConfig::test_magnet(), board, SimTransport::new()).unwrap();
    prop.begin();

    prop.reset();
    prop.run_for(2100);
    assert_eq!(prop.phase(), PropPhase::Idle);

    prop.board_mut().set_level(12, Level::Low);
    prop.run_for(50);
    assert!(prop.is_solved());
    assert!(prop.indicator_lit());
}

#[test]
fn test_test_magnet_preset_without_outputs() {
    let mut prop = PropController::new(PropConfig::test_magnet(), SimBoard::new(), SimTransport::new()).unwrap();
    prop.begin();

    let status = prop
        .transport()
        .published_on("ey/default/magie/prop/magie_test_magnet/status")
        .next()
        .unwrap()
        .json()
        .unwrap();
    assert!(status["details"].get("outputs").is_none());
    assert_eq!(status["name"], "Test Magnet");
}
