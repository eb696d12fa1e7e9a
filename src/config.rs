//! Bridge configuration parameters
//!
//! Everything the bridge needs to find its broker, its field device and its
//! firmware server. Loaded once at boot from a JSON document; any field left
//! out takes its default.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    // --- Network link ---
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,

    // --- Broker ---
    /// Broker host name or IP address
    pub mqtt_server: heapless::String<64>,
    pub mqtt_port: u16,
    /// Base topic; the full topic is `{mqtt_topic}/{device_id}/{suffix}`
    pub mqtt_topic: heapless::String<64>,

    // --- Firmware ---
    /// Image URL. Empty disables update checks.
    pub firmware_url: heapless::String<128>,
    /// Response header carrying the remote image version
    pub firmware_version_header: heapless::String<32>,

    pub modbus: ModbusSettings,
    pub timing: TimingConfig,
}

/// Field bus parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusSettings {
    /// Slave address of the field device (1-247)
    pub unit_id: u8,
    pub baud_rate: u32,
    /// Extra attempts per register after the first
    pub max_retries: u8,
    pub response_timeout_ms: u32,
}

/// Scheduler periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum spacing between poll steps
    pub poll_step_ms: u32,
    /// Rest between cycles so other masters can use the bus
    pub scan_rest_secs: u32,
    pub link_retry_ms: u32,
    pub session_retry_ms: u32,
    pub health_interval_secs: u32,
    /// 0 disables periodic firmware checks
    pub firmware_check_interval_secs: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            mqtt_server: heapless::String::new(),
            mqtt_port: 1883,
            mqtt_topic: fixed("esp/modbus"),
            firmware_url: heapless::String::new(),
            firmware_version_header: fixed("X-Object-Meta-Version"),
            modbus: ModbusSettings::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for ModbusSettings {
    fn default() -> Self {
        Self {
            unit_id: 1,
            baud_rate: 9600,
            max_retries: 2,
            response_timeout_ms: 200,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_step_ms: 100,
            scan_rest_secs: 2,
            link_retry_ms: 2000,
            session_retry_ms: 2000,
            health_interval_secs: 20,
            firmware_check_interval_secs: 0,
        }
    }
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Only used with literals that fit.
    let _ = out.push_str(s);
    out
}

const BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19_200, 38_400, 57_600, 115_200];

impl BridgeConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be non-zero"));
        }
        if self.mqtt_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_topic must not be empty"));
        }
        if self.mqtt_topic.contains(['#', '+']) || self.mqtt_topic.ends_with('/') {
            return Err(ConfigError::ValidationFailed(
                "mqtt_topic must not contain wildcards or a trailing '/'",
            ));
        }
        if !self.firmware_url.is_empty()
            && !(self.firmware_url.starts_with("http://") || self.firmware_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationFailed("firmware_url must be an http(s) URL"));
        }
        if self.firmware_version_header.is_empty() {
            return Err(ConfigError::ValidationFailed("firmware_version_header must not be empty"));
        }
        if !(1..=247).contains(&self.modbus.unit_id) {
            return Err(ConfigError::ValidationFailed("modbus.unit_id must be 1-247"));
        }
        if !BAUD_RATES.contains(&self.modbus.baud_rate) {
            return Err(ConfigError::ValidationFailed("modbus.baud_rate is not a standard rate"));
        }
        if self.modbus.max_retries > 10 {
            return Err(ConfigError::ValidationFailed("modbus.max_retries must be 0-10"));
        }
        if !(20..=5000).contains(&self.modbus.response_timeout_ms) {
            return Err(ConfigError::ValidationFailed("modbus.response_timeout_ms must be 20-5000"));
        }
        let t = &self.timing;
        if !(10..=10_000).contains(&t.poll_step_ms) {
            return Err(ConfigError::ValidationFailed("timing.poll_step_ms must be 10-10000"));
        }
        if t.scan_rest_secs > 3600 {
            return Err(ConfigError::ValidationFailed("timing.scan_rest_secs must be 0-3600"));
        }
        if !(500..=300_000).contains(&t.link_retry_ms) {
            return Err(ConfigError::ValidationFailed("timing.link_retry_ms must be 500-300000"));
        }
        if !(500..=300_000).contains(&t.session_retry_ms) {
            return Err(ConfigError::ValidationFailed("timing.session_retry_ms must be 500-300000"));
        }
        if !(5..=3600).contains(&t.health_interval_secs) {
            return Err(ConfigError::ValidationFailed("timing.health_interval_secs must be 5-3600"));
        }
        if t.firmware_check_interval_secs != 0 && t.firmware_check_interval_secs < 60 {
            return Err(ConfigError::ValidationFailed(
                "timing.firmware_check_interval_secs must be 0 or at least 60",
            ));
        }
        Ok(())
    }

    /// Periodic firmware checks only run with a URL and a non-zero period.
    pub fn firmware_checks_enabled(&self) -> bool {
        !self.firmware_url.is_empty() && self.timing.firmware_check_interval_secs > 0
    }
}
