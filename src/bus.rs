//! Exclusive access to the shared Modbus serial line.
//!
//! Every transaction on the transport takes a `&TransportToken`. Tokens
//! are only minted by [`BusArbiter::acquire`], and at most one exists at
//! a time, so "who may talk on the bus" is checked by the type system
//! rather than by pause flags scattered through the driver.
//!
//! ```text
//!   PollEngine ──┐
//!   write cmd  ──┼──▶ BusArbiter ──▶ TransportToken ──▶ ModbusPort
//!   Updater    ──┘
//! ```

use log::debug;

/// Which subsystem currently holds the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOwner {
    Poller,
    Command,
    Updater,
}

/// Proof of exclusive access. Not `Clone`; give it back with
/// [`BusArbiter::release`].
#[derive(Debug)]
pub struct TransportToken {
    owner: BusOwner,
}

impl TransportToken {
    pub fn owner(&self) -> BusOwner {
        self.owner
    }
}

/// Returned when the transport is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusBusy {
    pub holder: BusOwner,
}

#[derive(Debug, Default)]
pub struct BusArbiter {
    holder: Option<BusOwner>,
}

impl BusArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, owner: BusOwner) -> Result<TransportToken, BusBusy> {
        match self.holder {
            Some(holder) => {
                debug!("Bus: {:?} denied, held by {:?}", owner, holder);
                Err(BusBusy { holder })
            }
            None => {
                self.holder = Some(owner);
                Ok(TransportToken { owner })
            }
        }
    }

    pub fn release(&mut self, token: TransportToken) {
        debug_assert_eq!(self.holder, Some(token.owner));
        self.holder = None;
    }

    pub fn holder(&self) -> Option<BusOwner> {
        self.holder
    }

    pub fn is_held_by(&self, owner: BusOwner) -> bool {
        self.holder == Some(owner)
    }
}
