//! Application core: bridge orchestration, zero direct I/O.
//!
//! The driver ([`service::BridgeService`]) ties the poll engine, the
//! connectivity supervisor and the update coordinator together. All
//! interaction with peripherals and the network happens through the
//! **port traits** in [`ports`], keeping this layer testable on the host.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
