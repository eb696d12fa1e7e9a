//! Outbound bridge events.
//!
//! The domain emits these through the [`EventSink`](super::ports::EventSink)
//! port. The log adapter renders each as a single line; tests record
//! them to assert on ordering.

use crate::connectivity::{LinkState, SessionState};
use crate::error::{UpdateError, WriteError};
use crate::health::HealthReport;
use crate::scheduler::TimerId;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The driver started (carries firmware version).
    Started(&'static str),

    LinkChanged(LinkState),
    SessionChanged(SessionState),

    /// A retry or periodic timer was armed (no-op re-arms are not reported).
    TimerArmed(TimerId),
    /// A timer was cancelled while armed.
    TimerCancelled(TimerId),

    /// The poll engine finished a pass over the catalog.
    CycleCompleted { published_fields: usize, failed_registers: usize },

    /// A register write command finished.
    RegisterWritten { name: heapless::String<32>, value: u16 },
    RegisterWriteFailed { name: heapless::String<32>, error: WriteError },

    /// An inbound message was ignored: unknown suffix, bad body or over capacity.
    CommandIgnored { suffix: heapless::String<32> },

    UpdateNotAvailable,
    UpdateApplied,
    UpdateFailed(UpdateError),

    Health(HealthReport),
}
