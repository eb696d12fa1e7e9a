//! Resumable poll engine.
//!
//! Walks the [`Catalog`] one register per [`step`](PollEngine::step),
//! so a single call never costs more than one Modbus transaction:
//!
//! ```text
//!  Idle ──▶ Reading(i, r) ──ok──────────────▶ Reading(i+1, 0)
//!                │
//!                ├─err, r < MAX──────────────▶ Reading(i, r+1)   (next step)
//!                └─err, r = MAX──▶ slot i = failed ▶ Reading(i+1, 0)
//!
//!  Reading(len, _) ──▶ CycleComplete(samples) ──▶ cursor = (0, 0)
//! ```
//!
//! A failed register never aborts the cycle; its slot is simply empty.

use log::{debug, error, info, warn};

use crate::app::ports::{ModbusPort, PollControl};
use crate::bus::{BusArbiter, BusOwner};
use crate::catalog::{Catalog, EntityKind, MAX_REGISTERS};
use crate::error::WriteError;

/// Retries per register after the first attempt.
pub const DEFAULT_MAX_RETRIES: u8 = 2;

/// Position within the catalog and failed attempts at that position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCursor {
    pub index: usize,
    pub retry: u8,
}

/// One slot per catalog entry. `None` marks a register whose reads
/// were all exhausted during the cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    slots: heapless::Vec<Option<u16>, MAX_REGISTERS>,
}

impl SampleBuffer {
    fn reset(&mut self, len: usize) {
        self.slots.clear();
        // Catalog::new caps len at MAX_REGISTERS.
        let _ = self.slots.resize(len, None);
    }

    fn set(&mut self, index: usize, value: Option<u16>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = value;
        }
    }

    /// Raw value read for catalog entry `index`, if the read succeeded.
    pub fn get(&self, index: usize) -> Option<u16> {
        self.slots.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<u16>> + '_ {
        self.slots.iter().copied()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StepResult<'a> {
    InProgress,
    CycleComplete(&'a SampleBuffer),
}

/// Running totals reported in the health message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles_completed: u32,
    pub transactions: u32,
    pub failed_registers: u32,
}

pub struct PollEngine {
    catalog: Catalog,
    max_retries: u8,
    cursor: PollCursor,
    samples: SampleBuffer,
    suspended: bool,
    stats: PollStats,
}

impl PollEngine {
    pub fn new(catalog: Catalog, max_retries: u8) -> Self {
        let mut samples = SampleBuffer::default();
        samples.reset(catalog.len());
        Self {
            catalog,
            max_retries,
            cursor: PollCursor::default(),
            samples,
            suspended: false,
            stats: PollStats::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Perform at most one read transaction.
    ///
    /// No-op returning [`StepResult::InProgress`] while suspended or while
    /// another owner holds the bus.
    pub fn step(&mut self, bus: &mut BusArbiter, modbus: &mut impl ModbusPort) -> StepResult<'_> {
        if self.suspended {
            return StepResult::InProgress;
        }
        let Ok(token) = bus.acquire(BusOwner::Poller) else {
            return StepResult::InProgress;
        };

        let PollCursor { index, retry } = self.cursor;
        if index == 0 && retry == 0 {
            self.samples.reset(self.catalog.len());
        }
        let Some(spec) = self.catalog.get(index) else {
            bus.release(token);
            self.cursor = PollCursor::default();
            return StepResult::InProgress;
        };

        debug!(
            "Poll: '{}' (index {}/{}), try {}/{}",
            spec.name,
            index,
            self.catalog.len() - 1,
            u16::from(retry) + 1,
            u16::from(self.max_retries) + 1
        );
        let result = match spec.entity {
            EntityKind::Holding => modbus.read_holding(&token, spec.address),
        };
        bus.release(token);
        self.stats.transactions = self.stats.transactions.wrapping_add(1);

        match result {
            Ok(raw) => {
                debug!("Poll: '{}' = {}", spec.name, raw);
                self.samples.set(index, Some(raw));
                self.advance();
            }
            Err(e) if retry < self.max_retries => {
                warn!("Poll: read '{}' failed ({}), will retry", spec.name, e);
                self.cursor.retry += 1;
            }
            Err(e) => {
                error!(
                    "Poll: max retries reached for '{}' ({}), moving to next register",
                    spec.name, e
                );
                self.samples.set(index, None);
                self.stats.failed_registers = self.stats.failed_registers.wrapping_add(1);
                self.advance();
            }
        }

        if self.cursor.index >= self.catalog.len() {
            self.cursor = PollCursor::default();
            self.stats.cycles_completed = self.stats.cycles_completed.wrapping_add(1);
            info!(
                "Poll: cycle {} complete ({} failed)",
                self.stats.cycles_completed,
                self.samples.failed_count()
            );
            StepResult::CycleComplete(&self.samples)
        } else {
            StepResult::InProgress
        }
    }

    /// Write one register by catalog name, retrying up to `max_retries`
    /// extra times.
    ///
    /// Callers suspend the engine first so no cycle is left half-read
    /// around the write.
    pub fn write_register(
        &mut self,
        bus: &mut BusArbiter,
        modbus: &mut impl ModbusPort,
        name: &str,
        value: u16,
    ) -> Result<(), WriteError> {
        let Some(spec) = self.catalog.find(name) else {
            error!("Write: register name '{}' not found", name);
            return Err(WriteError::UnknownRegister);
        };
        if !self.suspended {
            warn!("Write: '{}' requested while polling is active", name);
        }
        let token = bus.acquire(BusOwner::Command).map_err(|_| WriteError::Busy)?;

        let attempts = u16::from(self.max_retries) + 1;
        let mut outcome = Err(WriteError::Timeout);
        for attempt in 1..=attempts {
            info!("Write: '{}' <- {} (trial {}/{})", name, value, attempt, attempts);
            self.stats.transactions = self.stats.transactions.wrapping_add(1);
            match modbus.write_single(&token, spec.address, value) {
                Ok(()) => {
                    info!("Write: {} written to register {}", value, spec.address);
                    outcome = Ok(());
                    break;
                }
                Err(e) => warn!("Write: attempt {} failed ({})", attempt, e),
            }
        }
        bus.release(token);

        if outcome.is_err() {
            error!("Write: '{}' timed out after {} attempts", name, attempts);
        }
        outcome
    }

    fn advance(&mut self) {
        self.cursor.index += 1;
        self.cursor.retry = 0;
    }
}

impl PollControl for PollEngine {
    /// Discard the in-flight cycle; the next resumed step starts over.
    fn suspend(&mut self) {
        if !self.suspended {
            info!("Poll: suspended at index {}", self.cursor.index);
        }
        self.suspended = true;
        self.cursor = PollCursor::default();
    }

    fn resume(&mut self) {
        if self.suspended {
            info!("Poll: resumed");
        }
        self.suspended = false;
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }
}
