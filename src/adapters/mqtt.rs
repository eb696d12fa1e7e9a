//! MQTT broker session adapter.
//!
//! Implements [`SessionPort`] and [`PublishPort`] over one client. Client
//! callbacks (connection state, inbound messages) run on the MQTT task;
//! they are queued over channels and drained by the driver loop, so
//! nothing in the domain runs off the main task.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client is created on each `connect()` with auto-reconnect off, so
//!   reconnect pacing stays with the connectivity supervisor.
//!   `disconnect()` drops it when the link goes away.
//! - **all other targets**: in-memory broker that records publishes and
//!   subscriptions and accepts injected messages.

use log::{info, warn};

use crate::app::commands::{Inbound, InboundMessage};
use crate::app::ports::{PublishPort, SessionEvent, SessionPort};
use crate::error::SessionError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
#[cfg(target_os = "espidf")]
use std::sync::mpsc;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// Broker endpoint and identity.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub server: heapless::String<64>,
    pub port: u16,
    pub client_id: heapless::String<24>,
}

impl MqttSettings {
    pub fn url(&self) -> heapless::String<96> {
        use core::fmt::Write;
        let mut url = heapless::String::new();
        let _ = write!(url, "mqtt://{}:{}", self.server, self.port);
        url
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct MqttSession {
    settings: MqttSettings,
    client: Option<EspMqttClient<'static>>,
    events_tx: mpsc::Sender<SessionEvent>,
    events: mpsc::Receiver<SessionEvent>,
    messages_tx: mpsc::Sender<Inbound>,
    messages: mpsc::Receiver<Inbound>,
}

#[cfg(target_os = "espidf")]
impl MqttSession {
    pub fn new(settings: MqttSettings) -> Self {
        let (events_tx, events) = mpsc::channel();
        let (messages_tx, messages) = mpsc::channel();
        Self {
            settings,
            client: None,
            events_tx,
            events,
            messages_tx,
            messages,
        }
    }
}

#[cfg(target_os = "espidf")]
impl SessionPort for MqttSession {
    fn connect(&mut self) -> Result<(), SessionError> {
        // A stale client keeps its own reconnect loop; replace it.
        self.client = None;

        let url = self.settings.url();
        info!("MQTT: connecting to {} as {}", url, self.settings.client_id);
        let conf = MqttClientConfiguration {
            client_id: Some(self.settings.client_id.as_str()),
            disable_auto_reconnect: true,
            ..Default::default()
        };
        let events_tx = self.events_tx.clone();
        let messages_tx = self.messages_tx.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                let _ = events_tx.send(SessionEvent::Connected);
            }
            EventPayload::Disconnected => {
                let _ = events_tx.send(SessionEvent::Disconnected);
            }
            EventPayload::Received { topic: Some(topic), data, .. } => {
                let inbound = InboundMessage::new(topic, data);
                if inbound.is_err() {
                    warn!("MQTT: {} byte message on {} exceeds capacity", data.len(), topic);
                }
                let _ = messages_tx.send(inbound);
            }
            EventPayload::Error(e) => warn!("MQTT: client error ({:?})", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client creation failed ({})", e);
            SessionError::ConnectFailed
        })?;
        self.client = Some(client);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            info!("MQTT: client dropped");
            let _ = self.events_tx.send(SessionEvent::Disconnected);
        }
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), SessionError> {
        let client = self.client.as_mut().ok_or(SessionError::NotConnected)?;
        client.subscribe(filter, QoS::AtLeastOnce).map_err(|e| {
            warn!("MQTT: subscribe {} failed ({})", filter, e);
            SessionError::SubscribeFailed
        })?;
        Ok(())
    }

    fn poll_message(&mut self) -> Option<Inbound> {
        self.messages.try_recv().ok()
    }
}

#[cfg(target_os = "espidf")]
impl PublishPort for MqttSession {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        let client = self.client.as_mut().ok_or(SessionError::NotConnected)?;
        client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map_err(|e| {
                warn!("MQTT: publish to {} failed ({})", topic, e);
                SessionError::PublishFailed
            })?;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation broker
// ───────────────────────────────────────────────────────────────

/// One message the simulated broker accepted.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

#[cfg(not(target_os = "espidf"))]
pub struct MqttSession {
    settings: MqttSettings,
    connected: bool,
    reachable: bool,
    events: VecDeque<SessionEvent>,
    messages: VecDeque<Inbound>,
    subscriptions: Vec<String>,
    published: Vec<Published>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttSession {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            connected: false,
            reachable: true,
            events: VecDeque::new(),
            messages: VecDeque::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
        }
    }

    /// Simulation: while unreachable, connects are answered with a drop.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Simulation: the broker closed the connection.
    pub fn drop_session(&mut self) {
        if self.connected {
            self.connected = false;
            self.events.push_back(SessionEvent::Disconnected);
        }
    }

    /// Simulation: deliver a message if it matches a subscription.
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        if self.subscriptions.iter().any(|f| topic_matches(f, topic)) {
            self.messages.push_back(InboundMessage::new(topic, payload));
        } else {
            warn!("MQTT(sim): no subscription for {}", topic);
        }
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn published(&self) -> &[Published] {
        &self.published
    }
}

#[cfg(not(target_os = "espidf"))]
impl SessionPort for MqttSession {
    fn connect(&mut self) -> Result<(), SessionError> {
        info!("MQTT(sim): connecting to {}", self.settings.url());
        if self.reachable {
            self.connected = true;
            self.events.push_back(SessionEvent::Connected);
        } else {
            self.events.push_back(SessionEvent::Disconnected);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.drop_session();
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.subscriptions.push(filter.into());
        Ok(())
    }

    fn poll_message(&mut self) -> Option<Inbound> {
        self.messages.pop_front()
    }
}

#[cfg(not(target_os = "espidf"))]
impl PublishPort for MqttSession {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }
}

/// MQTT filter match supporting a trailing `#` and single-level `+`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(a), Some(b)) if a == b => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
