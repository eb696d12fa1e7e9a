//! Mock adapters for integration tests.
//!
//! Every port records its calls so tests can assert on the full history
//! without a serial line, a radio, or a flash partition.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use mbbridge::app::commands::{Inbound, InboundMessage};
use mbbridge::app::events::BridgeEvent;
use mbbridge::app::ports::{
    EventSink, FirmwareFlasher, FirmwareSource, LinkEvent, LinkPort, ModbusPort, PublishPort,
    SessionEvent, SessionPort, SystemPort,
};
use mbbridge::app::service::{BridgePorts, BridgeService};
use mbbridge::bus::TransportToken;
use mbbridge::catalog::{Catalog, DEFAULT_REGISTERS};
use mbbridge::config::BridgeConfig;
use mbbridge::error::{LinkError, SessionError, TransportError, UpdateError};

pub const DEVICE_ID: &str = "ESP-MM-TEST";
pub const FIRMWARE: &str = "1.0.0";

/// Tick spacing used by [`Rig::run_until`].
pub const TICK_MS: u64 = 100;

// ── Modbus ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusCall {
    Read(u16),
    Write(u16, u16),
}

#[derive(Default)]
pub struct MockModbus {
    pub registers: BTreeMap<u16, u16>,
    pub failing: BTreeSet<u16>,
    pub calls: Vec<ModbusCall>,
}

#[allow(dead_code)]
impl MockModbus {
    /// The six registers of the default catalog, all answering.
    pub fn heat_pump() -> Self {
        let mut m = Self::default();
        for (addr, value) in [(93, 1), (94, 2), (51, 215), (107, 220), (106, 250), (109, 230)] {
            m.registers.insert(addr, value);
        }
        m
    }

    pub fn reads_of(&self, address: u16) -> usize {
        self.calls.iter().filter(|c| **c == ModbusCall::Read(address)).count()
    }

    pub fn read_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, ModbusCall::Read(_))).count()
    }
}

impl ModbusPort for MockModbus {
    fn read_holding(&mut self, _token: &TransportToken, address: u16) -> Result<u16, TransportError> {
        self.calls.push(ModbusCall::Read(address));
        if self.failing.contains(&address) {
            return Err(TransportError::Timeout);
        }
        self.registers.get(&address).copied().ok_or(TransportError::IllegalAddress)
    }

    fn write_single(
        &mut self,
        _token: &TransportToken,
        address: u16,
        value: u16,
    ) -> Result<(), TransportError> {
        self.calls.push(ModbusCall::Write(address, value));
        if self.failing.contains(&address) {
            return Err(TransportError::Timeout);
        }
        self.registers.insert(address, value);
        Ok(())
    }
}

// ── Link ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub connects: u32,
    pub disconnects: u32,
    /// Connect attempts answer `Down` instead of `Up`.
    pub unreachable: bool,
    events: VecDeque<LinkEvent>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn drop_link(&mut self) {
        self.events.push_back(LinkEvent::Down);
    }
}

impl LinkPort for MockLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.connects += 1;
        self.events.push_back(if self.unreachable { LinkEvent::Down } else { LinkEvent::Up });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.events.push_back(LinkEvent::Down);
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    pub unreachable: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<Publish>,
    events: VecDeque<SessionEvent>,
    inbound: VecDeque<Inbound>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage::new(topic, payload));
    }

    pub fn drop_session(&mut self) {
        self.connected = false;
        self.events.push_back(SessionEvent::Disconnected);
    }

    pub fn published_to(&self, topic: &str) -> Vec<&Publish> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }
}

impl SessionPort for MockBroker {
    fn connect(&mut self) -> Result<(), SessionError> {
        self.connects += 1;
        if self.unreachable {
            self.events.push_back(SessionEvent::Disconnected);
        } else {
            self.connected = true;
            self.events.push_back(SessionEvent::Connected);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        if self.connected {
            self.drop_session();
        }
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.subscriptions.push(filter.to_owned());
        Ok(())
    }

    fn poll_message(&mut self) -> Option<Inbound> {
        self.inbound.pop_front()
    }
}

impl PublishPort for MockBroker {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.published.push(Publish {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }
}

// ── Firmware ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSource {
    pub version: Option<String>,
    pub image: Vec<u8>,
    /// Content length to announce instead of the image length.
    pub announced: Option<usize>,
    pos: usize,
}

#[allow(dead_code)]
impl MockSource {
    pub fn with_image(version: &str, len: usize) -> Self {
        Self {
            version: Some(version.to_owned()),
            image: (0..len).map(|i| i as u8).collect(),
            ..Self::default()
        }
    }
}

impl FirmwareSource for MockSource {
    fn remote_version(&mut self) -> Option<heapless::String<32>> {
        self.version.as_deref().and_then(|v| heapless::String::try_from(v).ok())
    }

    fn open_image(&mut self) -> Result<usize, UpdateError> {
        self.pos = 0;
        Ok(self.announced.unwrap_or(self.image.len()))
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        let n = buf.len().min(self.image.len() - self.pos);
        buf[..n].copy_from_slice(&self.image[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCall {
    Begin(usize),
    Write(usize),
    End,
    Abort,
}

pub struct MockFlasher {
    pub calls: Vec<FlashCall>,
    pub capacity: usize,
    pub end_ok: bool,
    pub error_code: i32,
    finished: bool,
}

impl Default for MockFlasher {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            capacity: 1 << 20,
            end_ok: true,
            error_code: 0,
            finished: false,
        }
    }
}

impl FirmwareFlasher for MockFlasher {
    fn begin(&mut self, expected_size: usize) -> bool {
        self.calls.push(FlashCall::Begin(expected_size));
        self.finished = false;
        expected_size <= self.capacity
    }

    fn write_stream(&mut self, source: &mut dyn FirmwareSource) -> usize {
        let mut buf = [0u8; 256];
        let mut total = 0;
        while let Ok(n) = source.read_chunk(&mut buf) {
            if n == 0 {
                break;
            }
            total += n;
        }
        self.calls.push(FlashCall::Write(total));
        total
    }

    fn end(&mut self) -> bool {
        self.calls.push(FlashCall::End);
        self.finished = self.end_ok;
        self.end_ok
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn last_error(&self) -> i32 {
        self.error_code
    }

    fn abort(&mut self) {
        self.calls.push(FlashCall::Abort);
        self.finished = false;
    }
}

// ── System and sink ───────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub now_ms: u64,
    pub restarts: u32,
}

impl SystemPort for MockSystem {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn free_heap(&self) -> u32 {
        123_456
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<BridgeEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &BridgeEvent) {
        self.events.push(event.clone());
    }
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&BridgeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A service plus one of every mock, driven on a synthetic clock.
pub struct Rig {
    pub service: BridgeService,
    pub modbus: MockModbus,
    pub link: MockLink,
    pub broker: MockBroker,
    pub source: MockSource,
    pub flasher: MockFlasher,
    pub system: MockSystem,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_config(config: &BridgeConfig) -> Self {
        let catalog = Catalog::new(DEFAULT_REGISTERS).unwrap();
        let mut rig = Self {
            service: BridgeService::new(config, catalog, DEVICE_ID, FIRMWARE),
            modbus: MockModbus::heat_pump(),
            link: MockLink::default(),
            broker: MockBroker::default(),
            source: MockSource::default(),
            flasher: MockFlasher::default(),
            system: MockSystem::default(),
            sink: RecordingSink::default(),
        };
        rig.service.start(0, &mut rig.sink);
        rig
    }

    pub fn tick(&mut self) {
        let now_ms = self.system.now_ms;
        let mut ports = BridgePorts {
            modbus: &mut self.modbus,
            link: &mut self.link,
            session: &mut self.broker,
            source: &mut self.source,
            flasher: &mut self.flasher,
            system: &mut self.system,
        };
        self.service.tick(now_ms, &mut ports, &mut self.sink);
    }

    /// Tick every [`TICK_MS`] from the current time up to and including
    /// `until_ms`.
    pub fn run_until(&mut self, until_ms: u64) {
        while self.system.now_ms <= until_ms {
            self.tick();
            self.system.now_ms += TICK_MS;
        }
    }

    pub fn topic(&self, suffix: &str) -> String {
        format!("esp/modbus/{}/{}", DEVICE_ID, suffix)
    }
}
