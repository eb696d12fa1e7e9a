//! The service wired to the real adapter code: the RTU master framing
//! requests onto a simulated serial line, the simulated WiFi and broker,
//! the in-memory OTA partition and the simulated firmware server.

use mbbridge::adapters::http_firmware::HttpFirmwareSource;
use mbbridge::adapters::log_sink::LogEventSink;
use mbbridge::adapters::modbus_rtu::RtuMaster;
use mbbridge::adapters::mqtt::{MqttSession, MqttSettings};
use mbbridge::adapters::ota::OtaFlasher;
use mbbridge::adapters::sim_modbus::{Fault, SimModbusSlave, SimSerial};
use mbbridge::adapters::system::EspSystem;
use mbbridge::adapters::wifi::WifiLink;
use mbbridge::app::service::{BridgePorts, BridgeService};
use mbbridge::catalog::{Catalog, DEFAULT_REGISTERS};
use mbbridge::config::BridgeConfig;
use mbbridge::drivers::rs485::SimPin;
use serde_json::Value;

struct Stack {
    service: BridgeService,
    modbus: RtuMaster<SimSerial, SimPin>,
    link: WifiLink,
    session: MqttSession,
    source: HttpFirmwareSource,
    flasher: OtaFlasher,
    system: EspSystem,
    sink: LogEventSink,
}

impl Stack {
    fn new(slave: SimModbusSlave, source: HttpFirmwareSource) -> Self {
        let config = BridgeConfig::default();
        let catalog = Catalog::new(DEFAULT_REGISTERS).unwrap();
        let mut sink = LogEventSink::new();
        let mut service = BridgeService::new(&config, catalog, "ESP-MM-DEADBEEFCAFE", "1.0.0");
        service.start(0, &mut sink);
        Self {
            service,
            modbus: RtuMaster::new(SimSerial::new(slave), SimPin::default(), 1, 200),
            link: WifiLink::new("TestNet", "password1").unwrap(),
            session: MqttSession::new(MqttSettings {
                server: heapless::String::try_from("broker.local").unwrap(),
                port: 1883,
                client_id: heapless::String::try_from("ESP-MM-DEADBEEFCAFE").unwrap(),
            }),
            source,
            flasher: OtaFlasher::new(),
            system: EspSystem::new(),
            sink,
        }
    }

    fn run(&mut self, from_ms: u64, to_ms: u64) {
        for now in (from_ms..=to_ms).step_by(100) {
            let mut ports = BridgePorts {
                modbus: &mut self.modbus,
                link: &mut self.link,
                session: &mut self.session,
                source: &mut self.source,
                flasher: &mut self.flasher,
                system: &mut self.system,
            };
            self.service.tick(now, &mut ports, &mut self.sink);
        }
    }
}

fn heat_pump() -> SimModbusSlave {
    SimModbusSlave::new(1)
        .with(93, 1)
        .with(94, 2)
        .with(51, 215)
        .with(107, 220)
        .with(106, 250)
        .with(109, 230)
}

#[test]
fn snapshot_travels_from_serial_line_to_broker() {
    let mut stack = Stack::new(heat_pump(), HttpFirmwareSource::empty());
    stack.run(0, 500);

    let data: Vec<_> = stack
        .session
        .published()
        .iter()
        .filter(|p| p.topic == "esp/modbus/ESP-MM-DEADBEEFCAFE/data")
        .collect();
    assert_eq!(data.len(), 1);
    let v: Value = serde_json::from_slice(&data[0].payload).unwrap();
    assert_eq!(v["temp_akt"], 215);
    assert_eq!(v["temp_soll_heiz"], 250);
    assert_eq!(stack.modbus.serial().slave.reads(), 6);
}

#[test]
fn exception_response_leaves_field_out() {
    let mut slave = heat_pump();
    slave.inject_fault(94, Fault::Exception(2));
    let mut stack = Stack::new(slave, HttpFirmwareSource::empty());
    stack.run(0, 800);

    let data = stack
        .session
        .published()
        .iter()
        .find(|p| p.topic.ends_with("/data"))
        .unwrap();
    let v: Value = serde_json::from_slice(&data.payload).unwrap();
    assert!(v.get("modus").is_none());
    assert_eq!(v["ein_aus"], 1);
    assert_eq!(stack.service.poller().stats().failed_registers, 1);
}

#[test]
fn write_command_goes_out_as_function_06() {
    let mut stack = Stack::new(heat_pump(), HttpFirmwareSource::empty());
    stack.run(0, 300);
    stack
        .session
        .inject("esp/modbus/ESP-MM-DEADBEEFCAFE/action/write_register", b"temp_soll_heiz=240");
    stack.run(400, 400);

    assert_eq!(stack.modbus.serial().slave.get(106), Some(240));
    assert_eq!(stack.modbus.serial().slave.writes(), 1);
}

#[test]
fn upgrade_lands_in_the_inactive_partition() {
    let image: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let source = HttpFirmwareSource::with_image("1.2.0", image.clone());
    let mut stack = Stack::new(heat_pump(), source);
    stack.run(0, 300);
    stack
        .session
        .inject("esp/modbus/ESP-MM-DEADBEEFCAFE/action/upgrade", b"");
    stack.run(400, 400);

    assert_eq!(stack.flasher.image(), image.as_slice());
    assert!(stack.system.restart_requested());
    assert!(stack.service.is_halted());
}
