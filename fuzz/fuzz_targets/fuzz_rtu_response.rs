//! Fuzz target: Modbus RTU response validation.
//!
//! Arbitrary bytes as a slave's answer. The parsers must never panic, and
//! anything they accept must carry a valid CRC.
//!
//! cargo fuzz run fuzz_rtu_response

#![no_main]

use libfuzzer_sys::fuzz_target;
use mbbridge::adapters::modbus_rtu::frame;

fuzz_target!(|data: &[u8]| {
    let unit = data.first().copied().unwrap_or(1);

    if frame::parse_read_response(unit, data).is_ok() {
        assert_eq!(frame::crc16(data), 0, "accepted frame with bad CRC");
        assert!(data.len() >= frame::READ_RESPONSE_LEN);
    }

    if data.len() >= 6 {
        let address = u16::from_be_bytes([data[2], data[3]]);
        let value = u16::from_be_bytes([data[4], data[5]]);
        if frame::parse_write_response(unit, address, value, data).is_ok() {
            assert_eq!(frame::crc16(data), 0, "accepted echo with bad CRC");
        }
    }
});
