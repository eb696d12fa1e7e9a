//! Modbus RTU → MQTT bridge firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RtuMaster         WifiLink       MqttSession    EspSystem     │
//! │  (ModbusPort)      (LinkPort)     (Session+Pub)  (SystemPort)  │
//! │  HttpFirmwareSource  OtaFlasher   LogEventSink                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │             BridgeService (pure logic)                 │    │
//! │  │  PollEngine · ConnectivitySupervisor · Updater         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use mbbridge::adapters::device_id;
use mbbridge::adapters::http_firmware::HttpFirmwareSource;
use mbbridge::adapters::log_sink::LogEventSink;
use mbbridge::adapters::modbus_rtu::{self, RtuMaster};
use mbbridge::adapters::mqtt::{MqttSession, MqttSettings};
use mbbridge::adapters::ota::{self, OtaFlasher};
use mbbridge::adapters::system::EspSystem;
use mbbridge::adapters::wifi::WifiLink;
use mbbridge::app::ports::SystemPort;
use mbbridge::app::service::{BridgePorts, BridgeService};
use mbbridge::catalog::{Catalog, DEFAULT_REGISTERS};
use mbbridge::config::BridgeConfig;

/// Bridge settings baked in at build time (`MBBRIDGE_CONFIG_JSON`).
const CONFIG_JSON: Option<&str> = option_env!("MBBRIDGE_CONFIG_JSON");

/// Idle time between driver passes. Well under the step pacing.
const LOOP_SLEEP_MS: u32 = 10;

fn load_config() -> BridgeConfig {
    match CONFIG_JSON.map(BridgeConfig::from_json) {
        Some(Ok(cfg)) => {
            info!("Config loaded from build environment");
            cfg
        }
        Some(Err(e)) => {
            warn!("Embedded config rejected ({}), using defaults", e);
            BridgeConfig::default()
        }
        None => {
            warn!("No embedded config, using defaults");
            BridgeConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Modbus-MQTT bridge v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. OTA rollback check ─────────────────────────────────
    ota::check_rollback();

    // ── 2. Configuration and identity ─────────────────────────
    let config = load_config();
    let catalog = Catalog::new(DEFAULT_REGISTERS).map_err(anyhow::Error::msg)?;
    let id = device_id::device_id(&device_id::read_mac());
    info!("Device id {}", id);

    // ── 3. Peripherals and adapters ───────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    let uart = modbus_rtu::open_uart(
        peripherals.uart2,
        peripherals.pins.gpio17,
        peripherals.pins.gpio16,
        config.modbus.baud_rate,
    )?;
    let de_pin = PinDriver::output(peripherals.pins.gpio4)?;
    let mut modbus = RtuMaster::new(
        uart,
        de_pin,
        config.modbus.unit_id,
        config.modbus.response_timeout_ms,
    );

    let mut link = WifiLink::new(
        peripherals.modem,
        &sysloop,
        nvs,
        &config.wifi_ssid,
        &config.wifi_password,
    )
    .inspect_err(|e| error!("WiFi unavailable ({:#}), running offline", e))
    .ok();
    let mut session = MqttSession::new(MqttSettings {
        server: config.mqtt_server.clone(),
        port: config.mqtt_port,
        client_id: id.clone(),
    });
    let mut source = HttpFirmwareSource::new(&config.firmware_url, &config.firmware_version_header);
    let mut flasher = OtaFlasher::new();
    let mut system = EspSystem::new();
    let mut sink = LogEventSink::new();

    // ── 4. Bridge core ────────────────────────────────────────
    let mut service = BridgeService::new(&config, catalog, &id, env!("CARGO_PKG_VERSION"));
    service.start(system.uptime_ms(), &mut sink);

    info!("System ready. Entering driver loop.");

    // ── 5. Driver loop ────────────────────────────────────────
    loop {
        let now = system.uptime_ms();
        let mut ports = BridgePorts {
            modbus: &mut modbus,
            link: &mut link,
            session: &mut session,
            source: &mut source,
            flasher: &mut flasher,
            system: &mut system,
        };
        service.tick(now, &mut ports, &mut sink);
        FreeRtos::delay_ms(LOOP_SLEEP_MS);
    }
}
