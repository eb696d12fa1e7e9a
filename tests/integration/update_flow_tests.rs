//! Firmware update through the `upgrade` command and the periodic check.

use mbbridge::app::events::BridgeEvent;
use mbbridge::app::ports::PollControl;
use mbbridge::config::BridgeConfig;
use mbbridge::error::UpdateError;

use super::mock_hw::{FlashCall, MockSource, Rig};

fn rig_with_source(source: MockSource) -> Rig {
    let mut rig = Rig::new();
    rig.source = source;
    rig.run_until(300);
    rig
}

fn request_upgrade(rig: &mut Rig) {
    let topic = rig.topic("action/upgrade");
    rig.broker.inject(&topic, b"");
    rig.tick();
}

#[test]
fn newer_image_is_flashed_and_device_restarts() {
    let mut rig = rig_with_source(MockSource::with_image("1.1.0", 10_000));
    request_upgrade(&mut rig);

    assert_eq!(
        rig.flasher.calls,
        vec![FlashCall::Begin(10_000), FlashCall::Write(10_000), FlashCall::End]
    );
    assert!(rig.sink.events.contains(&BridgeEvent::UpdateApplied));
    assert_eq!(rig.system.restarts, 1);
    assert!(rig.service.is_halted());
    assert_eq!(rig.broker.disconnects, 1);
    assert_eq!(rig.link.disconnects, 1);
}

#[test]
fn halted_service_stops_polling() {
    let mut rig = rig_with_source(MockSource::with_image("2.0.0", 64));
    request_upgrade(&mut rig);
    let reads = rig.modbus.read_count();
    rig.system.now_ms += 100;
    rig.run_until(3_000);
    assert_eq!(rig.modbus.read_count(), reads);
    assert!(rig.service.poller().is_suspended());
}

#[test]
fn same_version_is_not_reflashed() {
    let mut rig = rig_with_source(MockSource::with_image("1.0.0", 64));
    request_upgrade(&mut rig);

    assert!(rig.flasher.calls.is_empty());
    assert!(rig.sink.events.contains(&BridgeEvent::UpdateNotAvailable));
    assert_eq!(rig.system.restarts, 0);
    assert!(!rig.service.poller().is_suspended());
}

#[test]
fn missing_image_is_not_available() {
    let mut rig = rig_with_source(MockSource::default());
    request_upgrade(&mut rig);
    assert!(rig.sink.events.contains(&BridgeEvent::UpdateNotAvailable));
}

#[test]
fn insufficient_space_aborts_and_resumes_polling() {
    let mut rig = rig_with_source(MockSource::with_image("1.1.0", 4_096));
    rig.flasher.capacity = 1_024;
    request_upgrade(&mut rig);

    assert_eq!(rig.flasher.calls, vec![FlashCall::Begin(4_096), FlashCall::Abort]);
    assert!(rig.sink.events.contains(&BridgeEvent::UpdateFailed(UpdateError::InsufficientSpace)));
    assert!(!rig.service.poller().is_suspended());
    assert!(!rig.service.is_halted());

    let reads = rig.modbus.read_count();
    rig.system.now_ms += 100;
    rig.tick();
    assert_eq!(rig.modbus.read_count(), reads + 1, "polling continues");
}

#[test]
fn truncated_body_is_a_short_write() {
    let mut source = MockSource::with_image("1.1.0", 500);
    source.announced = Some(1_000);
    let mut rig = rig_with_source(source);
    request_upgrade(&mut rig);

    assert!(rig.sink.events.contains(&BridgeEvent::UpdateFailed(UpdateError::ShortWrite {
        written: 500,
        expected: 1_000,
    })));
    assert_eq!(rig.flasher.calls.last(), Some(&FlashCall::Abort));
}

#[test]
fn end_failure_carries_flasher_code() {
    let mut rig = rig_with_source(MockSource::with_image("1.1.0", 128));
    rig.flasher.end_ok = false;
    rig.flasher.error_code = 9;
    request_upgrade(&mut rig);

    assert!(rig.sink.events.contains(&BridgeEvent::UpdateFailed(UpdateError::EndFailed(9))));
    assert_eq!(rig.system.restarts, 0);
}

#[test]
fn zero_length_image_is_rejected() {
    let mut source = MockSource::with_image("1.1.0", 0);
    source.announced = Some(0);
    let mut rig = rig_with_source(source);
    request_upgrade(&mut rig);

    assert!(rig.sink.events.contains(&BridgeEvent::UpdateFailed(UpdateError::InvalidContentLength)));
    assert!(!rig.flasher.calls.contains(&FlashCall::Begin(0)));
}

#[test]
fn periodic_check_runs_when_enabled() {
    let mut config = BridgeConfig::default();
    config.timing.firmware_check_interval_secs = 60;
    config.firmware_url = heapless::String::try_from("http://fw.local/bridge.bin").unwrap();
    let mut rig = Rig::with_config(&config);
    rig.run_until(60_000);
    assert_eq!(rig.sink.count(|e| *e == BridgeEvent::UpdateNotAvailable), 1);
}

#[test]
fn periodic_check_skipped_while_link_down() {
    let mut config = BridgeConfig::default();
    config.timing.firmware_check_interval_secs = 60;
    config.firmware_url = heapless::String::try_from("http://fw.local/bridge.bin").unwrap();
    let mut rig = Rig::with_config(&config);
    rig.link.unreachable = true;
    rig.source = MockSource::with_image("9.9.9", 64);
    rig.run_until(60_000);
    assert!(rig.flasher.calls.is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, BridgeEvent::UpdateNotAvailable)), 0);
}
