//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable device ID `ESP-MM-<hex>` from the full 6-byte MAC.
//! It is deterministic across reboots (factory-burned eFuse MAC) and is
//! used as the MQTT client id and the middle segment of every topic.

use core::fmt::Write;

/// "ESP-MM-" plus 12 hex digits.
pub type DeviceIdString = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the six bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `ESP-MM-` followed by the MAC as uppercase hex, leading zeros dropped.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let value = mac.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let mut id = DeviceIdString::new();
    let _ = write!(id, "ESP-MM-{:X}", value);
    id
}
