//! Modbus RTU master over a half-duplex RS-485 line.
//!
//! Implements [`ModbusPort`]: one request, one bounded wait for the
//! answer. Retries belong to the poll engine, not here.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`SerialLink`] for
//!   `esp_idf_hal::uart::UartDriver` in [`esp_impl`].
//! - **all other targets**: [`SimSerial`](super::sim_modbus::SimSerial)
//!   loops requests back through a simulated slave.
//!
//! ## Transaction
//!
//! 1. Drop stale bytes from the receive FIFO.
//! 2. Assert DE, write the 8-byte request, wait for TX to drain, release DE.
//! 3. Read until the frame is complete or the response timeout passes.
//!    The first two bytes decide how long the frame is.

pub mod frame;

#[cfg(target_os = "espidf")]
mod esp_impl;
#[cfg(target_os = "espidf")]
pub use esp_impl::open_uart;

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::ModbusPort;
use crate::bus::TransportToken;
use crate::drivers::rs485::Rs485Direction;
use crate::error::TransportError;

/// Byte-level serial line. Implemented by the ESP UART driver and by the
/// host loopback.
pub trait SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block until the transmit FIFO is empty.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Read what arrives within `timeout_ms`. `Ok(0)` means nothing came.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;

    fn clear_input(&mut self);
}

pub struct RtuMaster<S: SerialLink, P: OutputPin> {
    serial: S,
    de: Rs485Direction<P>,
    unit_id: u8,
    timeout_ms: u32,
}

impl<S: SerialLink, P: OutputPin> RtuMaster<S, P> {
    pub fn new(serial: S, de_pin: P, unit_id: u8, timeout_ms: u32) -> Self {
        Self {
            serial,
            de: Rs485Direction::new(de_pin),
            unit_id,
            timeout_ms,
        }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.serial.clear_input();
        self.de.transmit();
        let sent = self.serial.write(request).and_then(|()| self.serial.flush());
        self.de.receive();
        sent
    }

    /// Collect one response frame into `buf`; returns its length.
    fn receive(&mut self, buf: &mut [u8; frame::MAX_RESPONSE_LEN]) -> Result<usize, TransportError> {
        let mut len = 0;
        let mut want = 2;
        while len < want {
            let n = self.serial.read(&mut buf[len..want], self.timeout_ms)?;
            if n == 0 {
                break;
            }
            len += n;
            if len >= 2 && want == 2 {
                want = frame::expected_len(buf[1]);
            }
        }
        if len == 0 {
            debug!("RTU: no answer from unit {}", self.unit_id);
        }
        Ok(len)
    }

    fn transact(
        &mut self,
        request: &[u8],
        buf: &mut [u8; frame::MAX_RESPONSE_LEN],
    ) -> Result<usize, TransportError> {
        self.send(request)?;
        self.receive(buf)
    }
}

impl<S: SerialLink, P: OutputPin> ModbusPort for RtuMaster<S, P> {
    fn read_holding(&mut self, _token: &TransportToken, address: u16) -> Result<u16, TransportError> {
        let request = frame::read_holding_request(self.unit_id, address);
        let mut buf = [0u8; frame::MAX_RESPONSE_LEN];
        let len = self.transact(&request, &mut buf)?;
        frame::parse_read_response(self.unit_id, &buf[..len]).inspect_err(|e| {
            warn!("RTU: read @{} failed ({})", address, e);
        })
    }

    fn write_single(
        &mut self,
        _token: &TransportToken,
        address: u16,
        value: u16,
    ) -> Result<(), TransportError> {
        let request = frame::write_single_request(self.unit_id, address, value);
        let mut buf = [0u8; frame::MAX_RESPONSE_LEN];
        let len = self.transact(&request, &mut buf)?;
        frame::parse_write_response(self.unit_id, address, value, &buf[..len]).inspect_err(|e| {
            warn!("RTU: write @{}={} failed ({})", address, value, e);
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────
