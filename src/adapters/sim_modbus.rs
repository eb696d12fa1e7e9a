//! Simulated Modbus slave (heat-pump controller stand-in).
//!
//! Two ways in:
//!
//! - [`SimModbusSlave`] implements [`ModbusPort`] directly, for domain
//!   tests that do not care about framing.
//! - [`SimSerial`] implements [`SerialLink`] by answering RTU frames from
//!   the same register map, so the real [`RtuMaster`](super::modbus_rtu::RtuMaster)
//!   can be exercised end to end on the host.
//!
//! Faults are injectable per address (exception code or silence) and as a
//! countdown of corrupted responses.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use log::debug;

use super::modbus_rtu::SerialLink;
use super::modbus_rtu::frame::{self, FC_READ_HOLDING, FC_WRITE_SINGLE, crc16};
use crate::app::ports::ModbusPort;
use crate::bus::TransportToken;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this exception code.
    Exception(u8),
    /// Never answer.
    Silent,
}

#[derive(Debug, Clone)]
pub struct SimModbusSlave {
    unit_id: u8,
    registers: BTreeMap<u16, u16>,
    faults: BTreeMap<u16, Fault>,
    /// Next n responses carry a broken CRC.
    corrupt_next: u32,
    reads: u32,
    writes: u32,
}

impl SimModbusSlave {
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            registers: BTreeMap::new(),
            faults: BTreeMap::new(),
            corrupt_next: 0,
            reads: 0,
            writes: 0,
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, address: u16, value: u16) -> Self {
        self.set(address, value);
        self
    }

    pub fn set(&mut self, address: u16, value: u16) {
        self.registers.insert(address, value);
    }

    pub fn get(&self, address: u16) -> Option<u16> {
        self.registers.get(&address).copied()
    }

    pub fn inject_fault(&mut self, address: u16, fault: Fault) {
        self.faults.insert(address, fault);
    }

    pub fn clear_fault(&mut self, address: u16) {
        self.faults.remove(&address);
    }

    pub fn corrupt_next(&mut self, n: u32) {
        self.corrupt_next = n;
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }

    fn fault_for(&self, address: u16) -> Result<(), TransportError> {
        match self.faults.get(&address) {
            Some(Fault::Silent) => Err(TransportError::Timeout),
            Some(Fault::Exception(1)) => Err(TransportError::IllegalFunction),
            Some(Fault::Exception(2)) => Err(TransportError::IllegalAddress),
            Some(Fault::Exception(3)) => Err(TransportError::IllegalValue),
            Some(Fault::Exception(_)) => Err(TransportError::SlaveFailure),
            None => Ok(()),
        }
    }

    fn take_corruption(&mut self) -> bool {
        if self.corrupt_next > 0 {
            self.corrupt_next -= 1;
            true
        } else {
            false
        }
    }

    /// Answer one RTU request frame. `None` means the slave stays silent.
    pub fn respond(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() != frame::REQUEST_LEN || request[0] != self.unit_id {
            return None;
        }
        if crc16(&request[..6]).to_le_bytes() != [request[6], request[7]] {
            return None;
        }
        let function = request[1];
        let address = u16::from_be_bytes([request[2], request[3]]);
        let word = u16::from_be_bytes([request[4], request[5]]);

        let mut body = match self.faults.get(&address).copied() {
            Some(Fault::Silent) => return None,
            Some(Fault::Exception(code)) => vec![self.unit_id, function | 0x80, code],
            None => match function {
                FC_READ_HOLDING => match self.registers.get(&address) {
                    Some(&v) if word == 1 => {
                        self.reads += 1;
                        let [hi, lo] = v.to_be_bytes();
                        vec![self.unit_id, function, 2, hi, lo]
                    }
                    Some(_) => vec![self.unit_id, function | 0x80, 0x03],
                    None => vec![self.unit_id, function | 0x80, 0x02],
                },
                FC_WRITE_SINGLE => {
                    self.writes += 1;
                    self.registers.insert(address, word);
                    request[..6].to_vec()
                }
                _ => vec![self.unit_id, function | 0x80, 0x01],
            },
        };
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        if self.take_corruption() {
            let last = body.len() - 1;
            body[last] ^= 0xFF;
        }
        debug!("ModbusSim: fc {:#04x} @{} -> {:02X?}", function, address, body);
        Some(body)
    }
}

impl ModbusPort for SimModbusSlave {
    fn read_holding(&mut self, _token: &TransportToken, address: u16) -> Result<u16, TransportError> {
        self.fault_for(address)?;
        if self.take_corruption() {
            return Err(TransportError::InvalidChecksum);
        }
        let value = self.get(address).ok_or(TransportError::IllegalAddress)?;
        self.reads += 1;
        Ok(value)
    }

    fn write_single(
        &mut self,
        _token: &TransportToken,
        address: u16,
        value: u16,
    ) -> Result<(), TransportError> {
        self.fault_for(address)?;
        if self.take_corruption() {
            return Err(TransportError::InvalidChecksum);
        }
        self.writes += 1;
        self.set(address, value);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Serial line loopback
// ───────────────────────────────────────────────────────────────

/// A UART whose far end is a [`SimModbusSlave`].
pub struct SimSerial {
    pub slave: SimModbusSlave,
    rx: VecDeque<u8>,
    /// Every frame the master put on the wire.
    pub sent: Vec<Vec<u8>>,
    /// Deliver at most this many bytes per read (0 = unlimited).
    chunk: usize,
}

impl SimSerial {
    pub fn new(slave: SimModbusSlave) -> Self {
        Self {
            slave,
            rx: VecDeque::new(),
            sent: Vec::new(),
            chunk: 0,
        }
    }

    /// Split responses across several reads, as a slow UART FIFO would.
    pub fn set_chunk(&mut self, bytes: usize) {
        self.chunk = bytes;
    }

    /// Queue line noise ahead of the next response.
    pub fn push_garbage(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }
}

impl SerialLink for SimSerial {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sent.push(bytes.to_vec());
        if let Some(reply) = self.slave.respond(bytes) {
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, TransportError> {
        let limit = if self.chunk == 0 { buf.len() } else { buf.len().min(self.chunk) };
        let mut n = 0;
        while n < limit {
            let Some(b) = self.rx.pop_front() else { break };
            buf[n] = b;
            n += 1;
        }
        Ok(n)
    }

    fn clear_input(&mut self) {
        self.rx.clear();
    }
}
