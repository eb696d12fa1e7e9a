//! Register catalog: the fixed, ordered table of registers to poll.
//!
//! Entries are `'static` and never mutated. The catalog validates its
//! table once at construction so the poll engine can index it freely.

use crate::error::CatalogError;

/// Upper bound on catalog length; sizes the stack-allocated sample buffer.
pub const MAX_REGISTERS: usize = 32;

/// Bits in one holding register.
pub const MAX_BIT_NAMES: usize = 16;

/// Modbus data model entity. Only holding registers are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Holding,
}

/// How a raw 16-bit sample is turned into a published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeType {
    /// Plain unsigned value.
    U16,
    /// Sign-magnitude fixed point: bit 15 is the sign, bits 0–14 the
    /// magnitude, divided by `10^decimals`.
    ScaledSigned { decimals: u8 },
    /// Each bit is an independent named flag. Bit `n` maps to `names[n]`;
    /// expansion stops at the end of the list or the first empty name.
    Bitfield(&'static [&'static str]),
    /// Logged with its binary form; never published.
    DebugRaw,
}

/// One immutable catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    pub address: u16,
    pub entity: EntityKind,
    pub decode: DecodeType,
    pub name: &'static str,
}

impl RegisterSpec {
    pub const fn holding(address: u16, decode: DecodeType, name: &'static str) -> Self {
        Self {
            address,
            entity: EntityKind::Holding,
            decode,
            name,
        }
    }
}

/// Register table of the heat-pump controller this firmware ships for.
pub static DEFAULT_REGISTERS: &[RegisterSpec] = &[
    RegisterSpec::holding(93, DecodeType::U16, "ein_aus"),
    RegisterSpec::holding(94, DecodeType::U16, "modus"),
    RegisterSpec::holding(51, DecodeType::U16, "temp_akt"),
    RegisterSpec::holding(107, DecodeType::U16, "temp_soll_kuehl"),
    RegisterSpec::holding(106, DecodeType::U16, "temp_soll_heiz"),
    RegisterSpec::holding(109, DecodeType::U16, "temp_soll_auto"),
];

/// Keys a register contributes to the published snapshot.
fn published_keys(spec: &RegisterSpec) -> impl Iterator<Item = &'static str> {
    let (own, bits): (Option<&'static str>, &'static [&'static str]) = match spec.decode {
        DecodeType::U16 | DecodeType::ScaledSigned { .. } => (Some(spec.name), &[]),
        DecodeType::Bitfield(names) => (None, names),
        DecodeType::DebugRaw => (None, &[]),
    };
    own.into_iter()
        .chain(bits.iter().copied().take_while(|name| !name.is_empty()))
}

/// Validated view over a `'static` register table.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    entries: &'static [RegisterSpec],
}

impl Catalog {
    pub fn new(entries: &'static [RegisterSpec]) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        if entries.len() > MAX_REGISTERS {
            return Err(CatalogError::TooManyRegisters);
        }
        for (i, spec) in entries.iter().enumerate() {
            if let DecodeType::Bitfield(names) = spec.decode {
                if names.len() > MAX_BIT_NAMES {
                    return Err(CatalogError::TooManyBitNames);
                }
            }
            if entries[..i].iter().any(|other| other.name == spec.name) {
                return Err(CatalogError::DuplicateName);
            }
            // Snapshot keys share one flat namespace.
            for (j, key) in published_keys(spec).enumerate() {
                let earlier = entries[..i].iter().flat_map(published_keys).any(|k| k == key);
                if earlier || published_keys(spec).take(j).any(|k| k == key) {
                    return Err(CatalogError::DuplicateName);
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false` for a constructed catalog; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static RegisterSpec> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static RegisterSpec> {
        self.entries.iter()
    }

    /// Look a register up by its published name.
    pub fn find(&self, name: &str) -> Option<&'static RegisterSpec> {
        self.entries.iter().find(|spec| spec.name == name)
    }
}
