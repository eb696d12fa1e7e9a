//! Connectivity supervisor: reconnect state machines for the network
//! link and the broker session.
//!
//! Purely reactive: it consumes link/session events plus its own timers
//! and asks the adapters to connect. The two retry timers obey one
//! ordering rule:
//!
//! ```text
//!   link Down ──▶ cancel SessionRetry ──▶ arm LinkRetry
//!   link Up   ──▶ cancel LinkRetry    ──▶ arm SessionRetry (unless Connected)
//!   session Disconnected (link Up) ──▶ arm SessionRetry
//!   session Connected             ──▶ cancel SessionRetry
//! ```
//!
//! The session is never driven toward `Connecting` while the link is
//! not `Up`.

use log::{info, warn};
use serde::Serialize;

use crate::app::events::BridgeEvent;
use crate::app::ports::{EventSink, LinkEvent, LinkPort, SessionEvent, SessionPort};
use crate::scheduler::{Timer, TimerId, arm, arm_immediate, cancel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the caller should do after a supervisor tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorTick {
    /// The session has just reached `Connected`; subscribe and announce.
    pub session_established: bool,
    /// The link went down; the session adapter must drop its client so
    /// nothing dials the broker until the link is back.
    pub link_lost: bool,
    /// The periodic health report is due.
    pub health_due: bool,
}

pub struct ConnectivitySupervisor {
    link: LinkState,
    session: SessionState,
    link_timer: Timer,
    session_timer: Timer,
    health_timer: Timer,
}

impl ConnectivitySupervisor {
    pub fn new(link_retry_ms: u64, session_retry_ms: u64, health_interval_ms: u64) -> Self {
        Self {
            link: LinkState::Down,
            session: SessionState::Disconnected,
            link_timer: Timer::periodic(TimerId::LinkRetry, link_retry_ms),
            session_timer: Timer::periodic(TimerId::SessionRetry, session_retry_ms),
            health_timer: Timer::periodic(TimerId::Health, health_interval_ms),
        }
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn is_session_connected(&self) -> bool {
        self.session == SessionState::Connected
    }

    /// Begin bringing the link up and start the health report.
    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        arm_immediate(&mut self.link_timer, now_ms, sink);
        arm(&mut self.health_timer, now_ms, sink);
    }

    pub fn on_link_event(&mut self, event: LinkEvent, now_ms: u64, sink: &mut impl EventSink) {
        match event {
            LinkEvent::Up => {
                info!("Link: up");
                self.set_link(LinkState::Up, sink);
                cancel(&mut self.link_timer, sink);
                if self.session != SessionState::Connected {
                    arm_immediate(&mut self.session_timer, now_ms, sink);
                }
            }
            LinkEvent::Down => {
                warn!("Link: down");
                // Session retry goes first so no session attempt can race
                // the link re-acquisition.
                cancel(&mut self.session_timer, sink);
                self.set_link(LinkState::Down, sink);
                self.set_session(SessionState::Disconnected, sink);
                arm(&mut self.link_timer, now_ms, sink);
            }
        }
    }

    /// Returns `true` when the session has just become `Connected`.
    pub fn on_session_event(&mut self, event: SessionEvent, now_ms: u64, sink: &mut impl EventSink) -> bool {
        match event {
            SessionEvent::Connected => {
                info!("Session: connected");
                let fresh = self.session != SessionState::Connected;
                self.set_session(SessionState::Connected, sink);
                cancel(&mut self.session_timer, sink);
                fresh
            }
            SessionEvent::Disconnected => {
                warn!("Session: disconnected");
                self.set_session(SessionState::Disconnected, sink);
                if self.link == LinkState::Up {
                    arm(&mut self.session_timer, now_ms, sink);
                }
                false
            }
        }
    }

    /// Drain adapter events, fire due timers, and report what is due.
    pub fn tick(
        &mut self,
        now_ms: u64,
        link: &mut impl LinkPort,
        session: &mut impl SessionPort,
        sink: &mut impl EventSink,
    ) -> SupervisorTick {
        let mut out = SupervisorTick::default();

        while let Some(event) = link.poll_event() {
            out.link_lost |= event == LinkEvent::Down;
            self.on_link_event(event, now_ms, sink);
        }
        while let Some(event) = session.poll_event() {
            out.session_established |= self.on_session_event(event, now_ms, sink);
        }

        if self.link_timer.poll(now_ms) && self.link != LinkState::Up {
            info!("Link: connecting");
            self.set_link(LinkState::Connecting, sink);
            if let Err(e) = link.connect() {
                warn!("Link: connect attempt failed ({}), retrying", e);
                self.set_link(LinkState::Down, sink);
            }
        }

        if self.session_timer.poll(now_ms)
            && self.link == LinkState::Up
            && self.session != SessionState::Connected
        {
            info!("Session: connecting");
            self.set_session(SessionState::Connecting, sink);
            if let Err(e) = session.connect() {
                warn!("Session: connect attempt failed ({}), retrying", e);
                self.set_session(SessionState::Disconnected, sink);
            }
        }

        out.health_due = self.health_timer.poll(now_ms);
        out
    }

    fn set_link(&mut self, state: LinkState, sink: &mut impl EventSink) {
        if self.link != state {
            self.link = state;
            sink.emit(&BridgeEvent::LinkChanged(state));
        }
    }

    fn set_session(&mut self, state: SessionState, sink: &mut impl EventSink) {
        if self.session != state {
            self.session = state;
            sink.emit(&BridgeEvent::SessionChanged(state));
        }
    }
}
