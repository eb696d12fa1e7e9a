//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`BridgeEvent`] as one
//! structured line to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::BridgeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`BridgeEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &BridgeEvent) {
        match event {
            BridgeEvent::Started(version) => {
                info!("START | firmware={}", version);
            }
            BridgeEvent::LinkChanged(state) => {
                info!("LINK  | {:?}", state);
            }
            BridgeEvent::SessionChanged(state) => {
                info!("MQTT  | {:?}", state);
            }
            BridgeEvent::TimerArmed(id) => {
                info!("TIMER | armed {:?}", id);
            }
            BridgeEvent::TimerCancelled(id) => {
                info!("TIMER | cancelled {:?}", id);
            }
            BridgeEvent::CycleCompleted { published_fields, failed_registers } => {
                info!(
                    "POLL  | cycle done | fields={} | failed={}",
                    published_fields, failed_registers
                );
            }
            BridgeEvent::RegisterWritten { name, value } => {
                info!("WRITE | {}={} ok", name, value);
            }
            BridgeEvent::RegisterWriteFailed { name, error } => {
                warn!("WRITE | {} failed: {}", name, error);
            }
            BridgeEvent::CommandIgnored { suffix } => {
                warn!("CMD   | ignored '{}'", suffix);
            }
            BridgeEvent::UpdateNotAvailable => {
                info!("OTA   | no new firmware");
            }
            BridgeEvent::UpdateApplied => {
                info!("OTA   | applied, restarting");
            }
            BridgeEvent::UpdateFailed(e) => {
                warn!("OTA   | failed: {}", e);
            }
            BridgeEvent::Health(h) => {
                info!(
                    "HEALTH| heap={}B | up={}s | link={:?} | mqtt={:?} | cycles={} | failed={} | fw={}",
                    h.free_heap, h.uptime, h.link, h.session, h.cycles, h.failed_reads, h.firmware
                );
            }
        }
    }
}
