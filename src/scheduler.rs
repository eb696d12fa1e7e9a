//! Cooperative millisecond timers.
//!
//! The driver loop owns every timer and polls them with the current
//! uptime; nothing here sleeps, spawns, or calls back. A fired timer is
//! just `poll()` returning `true`, and the caller decides what to do.
//!
//! ```text
//!   main loop ──now_ms──▶ Timer::poll ──true──▶ caller runs the job
//!                             │
//!                             └─ re-armed (Periodic) / disarmed (OneShot)
//! ```
//!
//! Arming is idempotent: arming an armed timer keeps its current due
//! time, so a burst of "link down" notifications never stacks up several
//! retry sequences.

use crate::app::events::BridgeEvent;
use crate::app::ports::EventSink;

/// Identity of each timer in the bridge, reported in arm/cancel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    LinkRetry,
    SessionRetry,
    Health,
    PollStep,
    ScanRest,
    FirmwareCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires every `interval_ms` while armed.
    Periodic,
    /// Fires once, then disarms itself.
    OneShot,
}

#[derive(Debug, Clone)]
pub struct Timer {
    id: TimerId,
    kind: TimerKind,
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

impl Timer {
    pub fn periodic(id: TimerId, interval_ms: u64) -> Self {
        Self {
            id,
            kind: TimerKind::Periodic,
            interval_ms,
            next_due_ms: None,
        }
    }

    pub fn one_shot(id: TimerId, delay_ms: u64) -> Self {
        Self {
            id,
            kind: TimerKind::OneShot,
            interval_ms: delay_ms,
            next_due_ms: None,
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn is_armed(&self) -> bool {
        self.next_due_ms.is_some()
    }

    /// Arm with the first fire one interval from `now_ms`.
    /// Returns `false` (and changes nothing) if already armed.
    pub fn arm(&mut self, now_ms: u64) -> bool {
        self.arm_at(now_ms.saturating_add(self.interval_ms))
    }

    /// Arm with the first fire on the next poll.
    /// Returns `false` (and changes nothing) if already armed.
    pub fn arm_immediate(&mut self, now_ms: u64) -> bool {
        self.arm_at(now_ms)
    }

    /// Disarm. Returns `true` if the timer was armed.
    pub fn cancel(&mut self) -> bool {
        self.next_due_ms.take().is_some()
    }

    /// `true` when the timer is due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due_ms {
            Some(due) if now_ms >= due => {
                self.next_due_ms = match self.kind {
                    TimerKind::Periodic => Some(now_ms.saturating_add(self.interval_ms)),
                    TimerKind::OneShot => None,
                };
                true
            }
            _ => false,
        }
    }

    fn arm_at(&mut self, due_ms: u64) -> bool {
        if self.next_due_ms.is_some() {
            return false;
        }
        self.next_due_ms = Some(due_ms);
        true
    }
}

// ── Reported arm/cancel ──────────────────────────────────────
//
// Owners of a timer go through these so every real arm or cancel shows up
// as one event; idempotent no-ops stay silent.

pub fn arm(timer: &mut Timer, now_ms: u64, sink: &mut impl EventSink) {
    if timer.arm(now_ms) {
        sink.emit(&BridgeEvent::TimerArmed(timer.id()));
    }
}

pub fn arm_immediate(timer: &mut Timer, now_ms: u64, sink: &mut impl EventSink) {
    if timer.arm_immediate(now_ms) {
        sink.emit(&BridgeEvent::TimerArmed(timer.id()));
    }
}

pub fn cancel(timer: &mut Timer, sink: &mut impl EventSink) {
    if timer.cancel() {
        sink.emit(&BridgeEvent::TimerCancelled(timer.id()));
    }
}
