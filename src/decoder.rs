//! Raw sample decoding.
//!
//! Pure functions only: a raw `u16` and a [`DecodeType`] in, a typed
//! [`DecodedValue`] out.

use core::fmt::Write;

use crate::catalog::{DecodeType, MAX_BIT_NAMES};
use crate::error::DecodeError;

/// Raw code the controller uses for "no data" in sign-magnitude registers.
pub const NO_DATA: u16 = 0xFFFF;

/// One expanded bitfield flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedBit {
    pub name: &'static str,
    pub set: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Unsigned(u16),
    Scaled(f64),
    Bits(heapless::Vec<NamedBit, MAX_BIT_NAMES>),
    Debug {
        raw: u16,
        binary: heapless::String<16>,
    },
}

pub fn decode(raw: u16, decode_type: &DecodeType) -> Result<DecodedValue, DecodeError> {
    match *decode_type {
        DecodeType::U16 => Ok(DecodedValue::Unsigned(raw)),
        DecodeType::ScaledSigned { decimals } => decode_scaled(raw, decimals).map(DecodedValue::Scaled),
        DecodeType::Bitfield(names) => Ok(DecodedValue::Bits(expand_bits(raw, names))),
        DecodeType::DebugRaw => {
            let mut binary = heapless::String::new();
            // 16 binary digits always fit.
            let _ = write!(binary, "{raw:b}");
            Ok(DecodedValue::Debug { raw, binary })
        }
    }
}

/// Sign-magnitude fixed point.
pub fn decode_scaled(raw: u16, decimals: u8) -> Result<f64, DecodeError> {
    if raw == NO_DATA {
        return Err(DecodeError::SentinelValue);
    }
    let magnitude = f64::from(raw & 0x7FFF) / 10f64.powi(i32::from(decimals));
    Ok(if raw & 0x8000 != 0 { -magnitude } else { magnitude })
}

/// Expand `raw` into one flag per name, bit 0 first.
pub fn expand_bits(raw: u16, names: &'static [&'static str]) -> heapless::Vec<NamedBit, MAX_BIT_NAMES> {
    let mut bits = heapless::Vec::new();
    for (bit, &name) in names.iter().take(MAX_BIT_NAMES).enumerate() {
        if name.is_empty() {
            break;
        }
        let set = (raw >> bit) & 1 == 1;
        // take(MAX_BIT_NAMES) keeps this within capacity.
        let _ = bits.push(NamedBit { name, set });
    }
    bits
}
