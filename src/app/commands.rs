//! Inbound commands to the bridge service.
//!
//! Broker messages on `{base}/{device}/action/<suffix>` become
//! [`InboundCommand`]s that the [`BridgeService`](super::service::BridgeService)
//! routes to the poll engine's write path or to the update coordinator.

use crate::error::CommandError;

pub const WRITE_REGISTER: &str = "write_register";
pub const UPGRADE: &str = "upgrade";

pub const MAX_TOPIC_LEN: usize = 160;
pub const MAX_PAYLOAD_LEN: usize = 128;

/// A raw message as delivered by the session adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<MAX_TOPIC_LEN>,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

/// A broker message too large for an [`InboundMessage`]. Never routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedMessage {
    /// The topic, when it fits on its own.
    pub topic: Option<heapless::String<MAX_TOPIC_LEN>>,
    pub payload_len: usize,
}

/// What a session adapter hands the service for each received message.
pub type Inbound = Result<InboundMessage, OversizedMessage>;

impl InboundMessage {
    /// Copy borrowed parts. A topic or payload over capacity refuses the
    /// whole message; a cut-off body could still parse as a command.
    pub fn new(topic: &str, payload: &[u8]) -> Inbound {
        let t = heapless::String::try_from(topic).ok();
        match (t, heapless::Vec::from_slice(payload)) {
            (Some(topic), Ok(payload)) => Ok(Self { topic, payload }),
            (topic, _) => Err(OversizedMessage { topic, payload_len: payload.len() }),
        }
    }
}

/// Commands the outside world can send into the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// Write `value` to the catalog register called `name`.
    WriteRegister { name: heapless::String<32>, value: u16 },
    /// Check the firmware server and apply a newer image.
    Upgrade,
}

/// Parse the action suffix and body.
///
/// `Ok(None)` means the suffix is not a known command; the caller logs
/// and drops it.
pub fn parse(suffix: &str, body: &[u8]) -> Result<Option<InboundCommand>, CommandError> {
    match suffix {
        WRITE_REGISTER => parse_write(body).map(Some),
        UPGRADE => Ok(Some(InboundCommand::Upgrade)),
        _ => Ok(None),
    }
}

/// `name=value`, value a decimal integer in `0..=65535`.
fn parse_write(body: &[u8]) -> Result<InboundCommand, CommandError> {
    let body = core::str::from_utf8(body).map_err(|_| CommandError::MalformedBody)?;
    let (name, value) = body.trim().split_once('=').ok_or(CommandError::MalformedBody)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::MalformedBody);
    }
    let value = value.trim().parse::<u16>().map_err(|_| CommandError::InvalidValue)?;
    let name = heapless::String::try_from(name).map_err(|()| CommandError::MalformedBody)?;
    Ok(InboundCommand::WriteRegister { name, value })
}
