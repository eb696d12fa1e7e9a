//! Port traits: the hexagonal boundary between bridge logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BridgeService (domain)
//! ```
//!
//! Driven adapters (Modbus master, WiFi, MQTT client, OTA partition, HTTP
//! image server) implement these traits. The
//! [`BridgeService`](super::service::BridgeService) consumes them via
//! generics, so the domain core never touches a peripheral directly and
//! runs unchanged against the host mocks in `tests/`.

use crate::bus::TransportToken;
use crate::error::{LinkError, SessionError, TransportError, UpdateError};

use super::commands::Inbound;

// ───────────────────────────────────────────────────────────────
// Modbus transport (driven adapter: domain ↔ field device)
// ───────────────────────────────────────────────────────────────

/// One bounded Modbus transaction per call.
///
/// Both methods demand a [`TransportToken`]; only the current holder of
/// the bus can reach the wire.
pub trait ModbusPort {
    /// Read a single holding register (function 0x03, quantity 1).
    fn read_holding(&mut self, token: &TransportToken, address: u16) -> Result<u16, TransportError>;

    /// Write a single holding register (function 0x06).
    fn write_single(
        &mut self,
        token: &TransportToken,
        address: u16,
        value: u16,
    ) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Network link and broker session
// ───────────────────────────────────────────────────────────────

/// State-change notifications from the network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// State-change notifications from the broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
}

/// Network link (WiFi station). Connection attempts are fire-and-forget;
/// the outcome arrives later through [`poll_event`](Self::poll_event).
pub trait LinkPort {
    fn connect(&mut self) -> Result<(), LinkError>;
    fn disconnect(&mut self);
    fn poll_event(&mut self) -> Option<LinkEvent>;
}

/// A link that could not be configured never comes up; the bridge keeps
/// polling offline and the supervisor keeps retrying.
impl<T: LinkPort> LinkPort for Option<T> {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.as_mut().map_or(Err(LinkError::NoCredentials), LinkPort::connect)
    }

    fn disconnect(&mut self) {
        if let Some(link) = self {
            link.disconnect();
        }
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.as_mut().and_then(LinkPort::poll_event)
    }
}

/// Broker session (MQTT client).
pub trait SessionPort {
    fn connect(&mut self) -> Result<(), SessionError>;
    fn disconnect(&mut self);
    fn poll_event(&mut self) -> Option<SessionEvent>;
    fn subscribe(&mut self, filter: &str) -> Result<(), SessionError>;
    /// Next inbound message addressed to one of our subscriptions. A
    /// message over capacity arrives as `Err` so it can be reported.
    fn poll_message(&mut self) -> Option<Inbound>;
}

/// Outbound publish. Topic construction is the domain's job; the adapter
/// only moves bytes.
pub trait PublishPort {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware update
// ───────────────────────────────────────────────────────────────

/// Remote firmware image (HTTP server in production).
pub trait FirmwareSource {
    /// Version string advertised by the server. `None` or an empty
    /// string means no image is available.
    fn remote_version(&mut self) -> Option<heapless::String<32>>;

    /// Open the image for streaming. Returns the announced length.
    fn open_image(&mut self) -> Result<usize, UpdateError>;

    /// Read the next chunk of the open image. `Ok(0)` is end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError>;
}

/// Inactive-partition writer. Mirrors the begin/write/end contract of the
/// platform OTA API.
pub trait FirmwareFlasher {
    /// Prepare for an image of `expected_size` bytes. `false` when there
    /// is not enough space.
    fn begin(&mut self, expected_size: usize) -> bool;

    /// Drain `source` into flash. Returns the number of bytes written.
    fn write_stream(&mut self, source: &mut dyn FirmwareSource) -> usize;

    /// Verify and mark the image bootable.
    fn end(&mut self) -> bool;

    fn is_finished(&self) -> bool;

    /// Platform error code for the last failure (0 = none).
    fn last_error(&self) -> i32;

    /// Discard a partially written image.
    fn abort(&mut self);
}

// ───────────────────────────────────────────────────────────────
// System services
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Free heap in bytes.
    fn free_heap(&self) -> u32;

    /// Reboot into the (possibly new) firmware. Host implementations
    /// record the request instead.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Poll control and event sink
// ───────────────────────────────────────────────────────────────

/// Suspend/resume seam used by the update coordinator and the command
/// router around anything that needs the bus for longer than one step.
pub trait PollControl {
    fn suspend(&mut self);
    fn resume(&mut self);
    fn is_suspended(&self) -> bool;
}

/// The domain emits structured [`BridgeEvent`](super::events::BridgeEvent)s
/// through this port. Adapters decide where they go (serial log, test
/// recorder, …).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::BridgeEvent);
}
