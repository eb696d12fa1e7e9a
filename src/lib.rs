//! Modbus RTU to MQTT bridge firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod decoder;
pub mod error;
pub mod health;
pub mod poller;
pub mod publish;
pub mod scheduler;
pub mod update;

// The ESP-only halves of these are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
