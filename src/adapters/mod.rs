//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements                  | Connects to                 |
//! |-----------------|-----------------------------|-----------------------------|
//! | `modbus_rtu`    | ModbusPort                  | UART + RS-485 transceiver   |
//! | `sim_modbus`    | ModbusPort, SerialLink      | In-memory slave             |
//! | `wifi`          | LinkPort                    | ESP-IDF WiFi STA            |
//! | `mqtt`          | SessionPort, PublishPort    | ESP-IDF MQTT client         |
//! | `http_firmware` | FirmwareSource              | HTTP object server          |
//! | `ota`           | FirmwareFlasher             | Inactive OTA partition      |
//! | `system`        | SystemPort                  | Timer, heap, reset          |
//! | `log_sink`      | EventSink                   | Serial log output           |
//! | `device_id`     | -                           | eFuse MAC                   |

pub mod device_id;
pub mod http_firmware;
pub mod log_sink;
pub mod modbus_rtu;
pub mod mqtt;
pub mod ota;
pub mod sim_modbus;
pub mod system;
pub(super) mod utils;
pub mod wifi;
