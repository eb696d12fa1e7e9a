//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for the network link.
//! Connection attempts are fire-and-forget; the driver's system event
//! loop reports the outcome, which is queued and handed to the
//! connectivity supervisor through [`LinkPort::poll_event`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation with injectable link loss.

use log::{info, warn};

use super::utils::{is_printable_ascii, truncated};
use crate::app::ports::{LinkEvent, LinkPort};
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent},
};
#[cfg(target_os = "espidf")]
use std::sync::mpsc;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() {
        return Err(LinkError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    ssid: heapless::String<32>,
    attempts: u32,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    events: mpsc::Receiver<LinkEvent>,
    #[cfg(target_os = "espidf")]
    _subscriptions: [EspSubscription<'static, System>; 2],
    /// Simulation: queued events as the driver would report them.
    #[cfg(not(target_os = "espidf"))]
    sim_events: std::collections::VecDeque<LinkEvent>,
    /// Simulation: every n-th attempt fails to associate (0 = never).
    #[cfg(not(target_os = "espidf"))]
    sim_fail_every: u32,
}

#[cfg(target_os = "espidf")]
impl WifiLink {
    /// Configure the station and start the driver. Association begins on
    /// the first [`LinkPort::connect`].
    pub fn new(
        modem: Modem,
        sysloop: &EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        validate_ssid(ssid).map_err(anyhow::Error::msg)?;
        validate_password(password).map_err(anyhow::Error::msg)?;

        let mut wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|()| anyhow::Error::msg(LinkError::InvalidSsid))?,
            password: password
                .try_into()
                .map_err(|()| anyhow::Error::msg(LinkError::InvalidPassword))?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))?;
        wifi.start()?;

        let (tx, events) = mpsc::channel();
        let tx_ip = tx.clone();
        let wifi_sub = sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let WifiEvent::StaDisconnected(_) = event {
                let _ = tx.send(LinkEvent::Down);
            }
        })?;
        let ip_sub = sysloop.subscribe::<IpEvent, _>(move |event| {
            if let IpEvent::DhcpIpAssigned(_) = event {
                let _ = tx_ip.send(LinkEvent::Up);
            }
        })?;

        info!("WiFi: station configured for '{}'", ssid);
        Ok(Self {
            ssid: truncated(ssid),
            attempts: 0,
            wifi,
            events,
            _subscriptions: [wifi_sub, ip_sub],
        })
    }

    fn platform_connect(&mut self) -> Result<(), LinkError> {
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect request rejected ({})", e);
            LinkError::ConnectionFailed
        })
    }

    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed ({})", e);
        }
    }

    fn platform_poll(&mut self) -> Option<LinkEvent> {
        self.events.try_recv().ok()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiLink {
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: truncated(ssid),
            attempts: 0,
            sim_events: std::collections::VecDeque::new(),
            sim_fail_every: 0,
        })
    }

    /// Simulation: make every `n`-th association attempt fail.
    pub fn fail_every(&mut self, n: u32) {
        self.sim_fail_every = n;
    }

    /// Simulation: the access point went away.
    pub fn drop_link(&mut self) {
        warn!("WiFi(sim): link lost");
        self.sim_events.push_back(LinkEvent::Down);
    }

    fn platform_connect(&mut self) -> Result<(), LinkError> {
        if self.sim_fail_every != 0 && self.attempts % self.sim_fail_every == 0 {
            warn!("WiFi(sim): simulated association failure (attempt {})", self.attempts);
            self.sim_events.push_back(LinkEvent::Down);
            return Ok(());
        }
        info!("WiFi(sim): associated with '{}' (attempt {})", self.ssid, self.attempts);
        self.sim_events.push_back(LinkEvent::Up);
        Ok(())
    }

    fn platform_disconnect(&mut self) {
        self.sim_events.push_back(LinkEvent::Down);
    }

    fn platform_poll(&mut self) -> Option<LinkEvent> {
        self.sim_events.pop_front()
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.attempts = self.attempts.wrapping_add(1);
        info!("WiFi: connecting to '{}' (attempt {})", self.ssid, self.attempts);
        self.platform_connect()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnect requested");
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.platform_poll()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
