//! Modbus RTU ADU encoding and response validation.
//!
//! Only the two function codes the bridge uses are supported:
//! Read Holding Registers (0x03, quantity 1) and Write Single Register
//! (0x06). Requests are always 8 bytes; responses are 7 bytes for a read,
//! 8 bytes (an echo of the request) for a write, and 5 bytes for an
//! exception.

use crate::error::TransportError;

pub const FC_READ_HOLDING: u8 = 0x03;
pub const FC_WRITE_SINGLE: u8 = 0x06;

/// High bit set on the function code of an exception response.
const EXCEPTION_FLAG: u8 = 0x80;

pub const REQUEST_LEN: usize = 8;
pub const READ_RESPONSE_LEN: usize = 7;
pub const WRITE_RESPONSE_LEN: usize = 8;
pub const EXCEPTION_LEN: usize = 5;

/// Longest frame this master ever has to receive.
pub const MAX_RESPONSE_LEN: usize = WRITE_RESPONSE_LEN;

/// CRC-16/MODBUS (poly 0xA001 reflected, init 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// The CRC goes on the wire low byte first.
fn seal(frame: &mut [u8; REQUEST_LEN]) {
    let crc = crc16(&frame[..REQUEST_LEN - 2]);
    frame[REQUEST_LEN - 2..].copy_from_slice(&crc.to_le_bytes());
}

fn request(unit: u8, function: u8, address: u16, word: u16) -> [u8; REQUEST_LEN] {
    let [a_hi, a_lo] = address.to_be_bytes();
    let [w_hi, w_lo] = word.to_be_bytes();
    let mut frame = [unit, function, a_hi, a_lo, w_hi, w_lo, 0, 0];
    seal(&mut frame);
    frame
}

pub fn read_holding_request(unit: u8, address: u16) -> [u8; REQUEST_LEN] {
    request(unit, FC_READ_HOLDING, address, 1)
}

pub fn write_single_request(unit: u8, address: u16, value: u16) -> [u8; REQUEST_LEN] {
    request(unit, FC_WRITE_SINGLE, address, value)
}

/// Total length of the response once its first two bytes are known.
pub fn expected_len(function_byte: u8) -> usize {
    if function_byte & EXCEPTION_FLAG != 0 {
        EXCEPTION_LEN
    } else if function_byte == FC_WRITE_SINGLE {
        WRITE_RESPONSE_LEN
    } else {
        READ_RESPONSE_LEN
    }
}

fn exception(code: u8) -> TransportError {
    match code {
        0x01 => TransportError::IllegalFunction,
        0x02 => TransportError::IllegalAddress,
        0x03 => TransportError::IllegalValue,
        _ => TransportError::SlaveFailure,
    }
}

/// Shared checks: length, CRC, unit id, function code, exceptions.
fn validate(unit: u8, function: u8, frame: &[u8]) -> Result<(), TransportError> {
    if frame.len() < EXCEPTION_LEN {
        return Err(TransportError::Timeout);
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    if crc16(body).to_le_bytes() != [crc[0], crc[1]] {
        return Err(TransportError::InvalidChecksum);
    }
    if body[0] != unit {
        return Err(TransportError::InvalidSlaveId);
    }
    if body[1] == function | EXCEPTION_FLAG {
        return Err(exception(body[2]));
    }
    if body[1] != function {
        return Err(TransportError::IllegalFunction);
    }
    if frame.len() < expected_len(function) {
        return Err(TransportError::Timeout);
    }
    Ok(())
}

/// Validate a 0x03 response and extract the register value.
pub fn parse_read_response(unit: u8, frame: &[u8]) -> Result<u16, TransportError> {
    validate(unit, FC_READ_HOLDING, frame)?;
    if frame[2] != 2 {
        return Err(TransportError::SlaveFailure);
    }
    Ok(u16::from_be_bytes([frame[3], frame[4]]))
}

/// Validate a 0x06 response; the slave must echo address and value.
pub fn parse_write_response(
    unit: u8,
    address: u16,
    value: u16,
    frame: &[u8],
) -> Result<(), TransportError> {
    validate(unit, FC_WRITE_SINGLE, frame)?;
    let echoed_addr = u16::from_be_bytes([frame[2], frame[3]]);
    let echoed_val = u16::from_be_bytes([frame[4], frame[5]]);
    if echoed_addr != address || echoed_val != value {
        return Err(TransportError::SlaveFailure);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(body: &[u8]) -> Vec<u8> {
        let mut v = body.to_vec();
        v.extend_from_slice(&crc16(body).to_le_bytes());
        v
    }

    #[test]
    fn crc_known_vector() {
        // Read 2 registers at 0 from unit 1: 01 03 00 00 00 02 C4 0B
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0x0BC4);
    }

    #[test]
    fn read_request_layout() {
        let f = read_holding_request(1, 51);
        assert_eq!(&f[..6], &[0x01, 0x03, 0x00, 0x33, 0x00, 0x01]);
        assert_eq!(crc16(&f[..6]).to_le_bytes(), [f[6], f[7]]);
    }

    #[test]
    fn write_request_layout() {
        let f = write_single_request(1, 107, 0x00DC);
        assert_eq!(&f[..6], &[0x01, 0x06, 0x00, 0x6B, 0x00, 0xDC]);
    }

    #[test]
    fn read_response_value() {
        let frame = sealed(&[0x01, 0x03, 0x02, 0x01, 0x2C]);
        assert_eq!(parse_read_response(1, &frame), Ok(300));
    }

    #[test]
    fn exception_codes_map() {
        for (code, err) in [
            (1, TransportError::IllegalFunction),
            (2, TransportError::IllegalAddress),
            (3, TransportError::IllegalValue),
            (4, TransportError::SlaveFailure),
        ] {
            let frame = sealed(&[0x01, 0x83, code]);
            assert_eq!(parse_read_response(1, &frame), Err(err));
        }
    }

    #[test]
    fn corrupted_crc_rejected() {
        let mut frame = sealed(&[0x01, 0x03, 0x02, 0x00, 0x07]);
        frame[4] ^= 0x01;
        assert_eq!(parse_read_response(1, &frame), Err(TransportError::InvalidChecksum));
    }

    #[test]
    fn foreign_unit_rejected() {
        let frame = sealed(&[0x02, 0x03, 0x02, 0x00, 0x07]);
        assert_eq!(parse_read_response(1, &frame), Err(TransportError::InvalidSlaveId));
    }

    #[test]
    fn empty_or_short_is_timeout() {
        assert_eq!(parse_read_response(1, &[]), Err(TransportError::Timeout));
        assert_eq!(parse_read_response(1, &[0x01, 0x03]), Err(TransportError::Timeout));
    }

    #[test]
    fn write_echo_must_match() {
        let echo = write_single_request(1, 94, 3);
        assert_eq!(parse_write_response(1, 94, 3, &echo), Ok(()));
        assert_eq!(
            parse_write_response(1, 94, 4, &echo),
            Err(TransportError::SlaveFailure)
        );
    }

    #[test]
    fn expected_lengths() {
        assert_eq!(expected_len(0x03), READ_RESPONSE_LEN);
        assert_eq!(expected_len(0x06), WRITE_RESPONSE_LEN);
        assert_eq!(expected_len(0x83), EXCEPTION_LEN);
    }
}
