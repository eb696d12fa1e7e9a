//! Unified error types for the Modbus bridge firmware.
//!
//! Each subsystem has its own small `Copy` error enum so it can be passed
//! through the poll engine and the update coordinator without allocation.
//! All of them convert into the top-level [`Error`], which is what the
//! driver loop and `main` deal with.
//!
//! Only [`WriteError`] and [`UpdateError`] (wrapped in an update outcome)
//! ever reach a command caller; everything else is recovered locally.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Transport(TransportError),
    Decode(DecodeError),
    Write(WriteError),
    Update(UpdateError),
    Link(LinkError),
    Session(SessionError),
    Catalog(CatalogError),
    Command(CommandError),
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Write(e) => write!(f, "write: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Catalog(e) => write!(f, "catalog: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Modbus transport errors
// ---------------------------------------------------------------------------

/// Per-transaction failure reported by the Modbus transport.
///
/// The first five mirror Modbus exception codes; `Timeout` and
/// `InvalidChecksum` are link-level failures detected by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    IllegalFunction,
    IllegalAddress,
    IllegalValue,
    SlaveFailure,
    InvalidSlaveId,
    Timeout,
    InvalidChecksum,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "illegal function"),
            Self::IllegalAddress => write!(f, "illegal data address"),
            Self::IllegalValue => write!(f, "illegal data value"),
            Self::SlaveFailure => write!(f, "slave device failure"),
            Self::InvalidSlaveId => write!(f, "invalid slave ID"),
            Self::Timeout => write!(f, "response timed out"),
            Self::InvalidChecksum => write!(f, "invalid CRC"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The device reported its reserved "no data" code (`0xFFFF`).
    SentinelValue,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SentinelValue => write!(f, "device reported no data (0xFFFF)"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Register write errors (caller-visible)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// No catalog entry carries the requested name.
    UnknownRegister,
    /// Every attempt failed at the transport.
    Timeout,
    /// Another owner holds the transport token.
    Busy,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRegister => write!(f, "unknown register"),
            Self::Timeout => write!(f, "write timed out after all retries"),
            Self::Busy => write!(f, "transport held by another owner"),
        }
    }
}

impl From<WriteError> for Error {
    fn from(e: WriteError) -> Self {
        Self::Write(e)
    }
}

// ---------------------------------------------------------------------------
// Firmware update errors
// ---------------------------------------------------------------------------

/// Why a firmware update did not apply. Always non-fatal: polling resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// Image server could not be reached or answered with an error.
    SourceUnavailable,
    /// Server sent no (or a zero) content length.
    InvalidContentLength,
    /// The flasher refused `begin`: not enough space for the image.
    InsufficientSpace,
    /// Fewer bytes reached flash than the server announced.
    ShortWrite { written: usize, expected: usize },
    /// `end()` rejected the image; carries the flasher's error code.
    EndFailed(i32),
    /// `end()` succeeded but the flasher does not report a finished image.
    NotFinished,
    /// The transport token was held by another owner.
    Busy,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable => write!(f, "unable to reach firmware server"),
            Self::InvalidContentLength => write!(f, "invalid content length from server"),
            Self::InsufficientSpace => write!(f, "not enough space to begin update"),
            Self::ShortWrite { written, expected } => {
                write!(f, "short write: {written}/{expected} bytes")
            }
            Self::EndFailed(code) => write!(f, "update end failed (error #{code})"),
            Self::NotFinished => write!(f, "update did not finish properly"),
            Self::Busy => write!(f, "transport held by another owner"),
        }
    }
}

impl From<UpdateError> for Error {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors (never surfaced beyond the supervisor)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes, or empty)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    NotConnected,
    ConnectFailed,
    SubscribeFailed,
    PublishFailed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "broker session not connected"),
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Catalog and command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    Empty,
    TooManyRegisters,
    TooManyBitNames,
    DuplicateName,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "register catalog is empty"),
            Self::TooManyRegisters => write!(f, "register catalog exceeds capacity"),
            Self::TooManyBitNames => write!(f, "bitfield names more than 16 bits"),
            Self::DuplicateName => write!(f, "duplicate register or bit name"),
        }
    }
}

impl From<CatalogError> for Error {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

/// Inbound command could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Body is not of the form `name=value`.
    MalformedBody,
    /// Value is not an integer in `0..=65535`.
    InvalidValue,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedBody => write!(f, "expected body of the form name=value"),
            Self::InvalidValue => write!(f, "value must be an integer 0-65535"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for [`BridgeConfig`](crate::config::BridgeConfig).
    Parse,
    /// A field is out of range; carries which one.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "malformed configuration document"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
