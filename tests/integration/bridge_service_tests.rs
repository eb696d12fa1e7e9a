//! BridgeService driven end to end against the recording mocks.

use mbbridge::app::events::BridgeEvent;
use mbbridge::app::ports::PollControl;
use mbbridge::config::BridgeConfig;
use mbbridge::connectivity::{LinkState, SessionState};
use mbbridge::error::WriteError;
use mbbridge::scheduler::TimerId;
use serde_json::Value;

use super::mock_hw::{DEVICE_ID, ModbusCall, Rig};

fn json(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap()
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn connects_link_then_session_and_announces() {
    let mut rig = Rig::new();
    rig.run_until(300);

    assert_eq!(rig.service.supervisor().link(), LinkState::Up);
    assert_eq!(rig.service.supervisor().session(), SessionState::Connected);
    assert_eq!(rig.link.connects, 1);
    assert_eq!(rig.broker.connects, 1);
    assert_eq!(rig.broker.subscriptions, vec![format!("esp/modbus/{}/action/#", DEVICE_ID)]);

    let status = rig.broker.published_to(&rig.topic("status"));
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].payload, b"mqtt_connected");
    assert!(status[0].retain);
}

#[test]
fn no_session_attempt_before_link_is_up() {
    let mut rig = Rig::new();
    rig.link.unreachable = true;
    rig.run_until(5_000);
    assert!(rig.link.connects >= 2);
    assert_eq!(rig.broker.connects, 0);
    assert_eq!(rig.service.supervisor().session(), SessionState::Disconnected);
}

// ── Poll cycle and publish ────────────────────────────────────

#[test]
fn full_cycle_publishes_retained_snapshot() {
    let mut rig = Rig::new();
    rig.run_until(500);

    let data = rig.broker.published_to(&rig.topic("data"));
    assert_eq!(data.len(), 1);
    assert!(data[0].retain);
    let v = json(&data[0].payload);
    assert_eq!(v["ein_aus"], 1);
    assert_eq!(v["modus"], 2);
    assert_eq!(v["temp_akt"], 215);
    assert_eq!(v["temp_soll_auto"], 230);
    assert_eq!(v.as_object().unwrap().len(), 6);

    assert!(rig.sink.events.contains(&BridgeEvent::CycleCompleted {
        published_fields: 6,
        failed_registers: 0,
    }));
}

#[test]
fn catalog_order_is_polled_one_read_per_step() {
    let mut rig = Rig::new();
    rig.run_until(500);
    let reads: Vec<_> = rig.modbus.calls.clone();
    assert_eq!(
        reads,
        vec![
            ModbusCall::Read(93),
            ModbusCall::Read(94),
            ModbusCall::Read(51),
            ModbusCall::Read(107),
            ModbusCall::Read(106),
            ModbusCall::Read(109),
        ]
    );
}

#[test]
fn failing_register_is_retried_then_omitted() {
    let mut rig = Rig::new();
    rig.modbus.failing.insert(51);
    rig.run_until(800);

    // max_retries 2 → three attempts in total
    assert_eq!(rig.modbus.reads_of(51), 3);
    let data = rig.broker.published_to(&rig.topic("data"));
    assert_eq!(data.len(), 1);
    let v = json(&data[0].payload);
    assert!(v.get("temp_akt").is_none());
    assert_eq!(v["temp_soll_kuehl"], 220);
    assert!(rig.sink.events.contains(&BridgeEvent::CycleCompleted {
        published_fields: 5,
        failed_registers: 1,
    }));
}

#[test]
fn rests_between_cycles() {
    let mut rig = Rig::new();
    rig.run_until(500);
    assert!(rig.service.is_resting());
    let after_cycle = rig.modbus.read_count();

    rig.run_until(2_400);
    assert_eq!(rig.modbus.read_count(), after_cycle, "no reads while resting");

    rig.run_until(2_600);
    assert!(rig.modbus.read_count() > after_cycle);
    assert!(!rig.service.is_resting());
}

#[test]
fn snapshot_dropped_while_session_down() {
    let mut rig = Rig::new();
    rig.broker.unreachable = true;
    rig.run_until(500);
    assert!(rig.broker.published.is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(e, BridgeEvent::CycleCompleted { .. })),
        1
    );
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn write_register_command_reaches_the_bus() {
    let mut rig = Rig::new();
    rig.run_until(300);
    let topic = rig.topic("action/write_register");
    rig.broker.inject(&topic, b"modus=3");
    rig.run_until(400);

    assert!(rig.modbus.calls.contains(&ModbusCall::Write(94, 3)));
    assert_eq!(rig.modbus.registers[&94], 3);
    assert!(rig.sink.events.contains(&BridgeEvent::RegisterWritten {
        name: heapless::String::try_from("modus").unwrap(),
        value: 3,
    }));
    assert!(!rig.service.poller().is_suspended());
}

#[test]
fn unknown_register_write_fails_without_bus_traffic() {
    let mut rig = Rig::new();
    rig.run_until(300);
    let before = rig.modbus.calls.len();
    let topic = rig.topic("action/write_register");
    rig.broker.inject(&topic, b"nope=1");
    rig.tick();

    assert!(rig.sink.events.contains(&BridgeEvent::RegisterWriteFailed {
        name: heapless::String::try_from("nope").unwrap(),
        error: WriteError::UnknownRegister,
    }));
    // only the regular poll step touched the bus
    assert_eq!(rig.modbus.calls.len(), before + 1);
}

#[test]
fn oversized_write_body_is_dropped_not_cut_short() {
    let mut rig = Rig::new();
    rig.run_until(300);
    // Cut at the payload capacity this would read as modus=0.
    let body = format!("modus={}5", "0".repeat(200));
    let topic = rig.topic("action/write_register");
    rig.broker.inject(&topic, body.as_bytes());
    rig.tick();

    assert!(!rig.modbus.calls.iter().any(|c| matches!(c, ModbusCall::Write(..))));
    assert_eq!(rig.modbus.registers[&94], 2);
    assert!(rig.sink.events.contains(&BridgeEvent::CommandIgnored {
        suffix: heapless::String::try_from("write_register").unwrap(),
    }));
}

#[test]
fn failing_write_is_retried_and_reported() {
    let mut rig = Rig::new();
    rig.run_until(600);
    rig.modbus.failing.insert(107);
    let topic = rig.topic("action/write_register");
    rig.broker.inject(&topic, b"temp_soll_kuehl=200");
    rig.tick();

    let writes = rig
        .modbus
        .calls
        .iter()
        .filter(|c| matches!(c, ModbusCall::Write(107, 200)))
        .count();
    assert_eq!(writes, 3);
    assert!(rig.sink.events.contains(&BridgeEvent::RegisterWriteFailed {
        name: heapless::String::try_from("temp_soll_kuehl").unwrap(),
        error: WriteError::Timeout,
    }));
}

#[test]
fn unknown_and_malformed_commands_are_ignored() {
    let mut rig = Rig::new();
    rig.run_until(300);
    let reboot = rig.topic("action/reboot");
    let write = rig.topic("action/write_register");
    rig.broker.inject(&reboot, b"");
    rig.broker.inject(&write, b"modus");
    rig.tick();

    assert_eq!(
        rig.sink.count(|e| matches!(e, BridgeEvent::CommandIgnored { .. })),
        2
    );
    assert!(!rig.modbus.calls.iter().any(|c| matches!(c, ModbusCall::Write(..))));
}

// ── Connectivity ──────────────────────────────────────────────

#[test]
fn link_loss_cancels_session_retry_before_rearming_link() {
    let mut rig = Rig::new();
    rig.broker.unreachable = true;
    rig.run_until(300);
    assert_eq!(rig.service.supervisor().link(), LinkState::Up);

    rig.sink.events.clear();
    rig.link.drop_link();
    rig.tick();

    let timers: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::TimerArmed(_) | BridgeEvent::TimerCancelled(_)))
        .cloned()
        .collect();
    assert_eq!(
        timers,
        vec![
            BridgeEvent::TimerCancelled(TimerId::SessionRetry),
            BridgeEvent::TimerArmed(TimerId::LinkRetry),
        ]
    );
    assert_eq!(rig.service.supervisor().link(), LinkState::Down);
}

#[test]
fn link_loss_drops_broker_client_until_link_returns() {
    let mut rig = Rig::new();
    rig.run_until(300);
    assert!(rig.broker.connected);

    rig.link.unreachable = true;
    rig.link.drop_link();
    rig.tick();
    assert_eq!(rig.broker.disconnects, 1);
    assert!(!rig.broker.connected);

    rig.run_until(5_000);
    assert_eq!(rig.broker.connects, 1, "no broker attempt while the link is down");
    assert_eq!(rig.service.supervisor().session(), SessionState::Disconnected);

    rig.link.unreachable = false;
    rig.run_until(10_000);
    assert_eq!(rig.service.supervisor().session(), SessionState::Connected);
    assert_eq!(rig.broker.connects, 2);
}

#[test]
fn session_drop_reconnects_and_resubscribes() {
    let mut rig = Rig::new();
    rig.run_until(300);
    rig.broker.drop_session();
    rig.run_until(2_600);

    assert_eq!(rig.service.supervisor().session(), SessionState::Connected);
    assert_eq!(rig.broker.connects, 2);
    assert_eq!(rig.broker.subscriptions.len(), 2);
}

// ── Health ────────────────────────────────────────────────────

#[test]
fn health_report_published_on_interval() {
    let mut rig = Rig::new();
    rig.run_until(20_000);

    let status = rig.broker.published_to(&rig.topic("status"));
    let health: Vec<_> = status.iter().filter(|p| p.payload.starts_with(b"{")).collect();
    assert_eq!(health.len(), 1);
    let v = json(&health[0].payload);
    assert_eq!(v["freeHeap"], 123_456);
    assert_eq!(v["uptime"], 20);
    assert_eq!(v["link"], "up");
    assert_eq!(v["session"], "connected");
    assert_eq!(v["firmware"], "1.0.0");
    assert!(v["cycles"].as_u64().unwrap() >= 1);
    assert_eq!(rig.sink.count(|e| matches!(e, BridgeEvent::Health(_))), 1);
}

#[test]
fn custom_topic_prefix_is_used() {
    let mut config = BridgeConfig::default();
    config.mqtt_topic = heapless::String::try_from("plant/hp").unwrap();
    let mut rig = Rig::with_config(&config);
    rig.run_until(500);
    assert_eq!(
        rig.broker.published_to(&format!("plant/hp/{}/data", DEVICE_ID)).len(),
        1
    );
}
