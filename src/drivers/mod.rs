//! Peripheral drivers.

pub mod rs485;
