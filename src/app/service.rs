//! Bridge service: the hexagonal core.
//!
//! [`BridgeService`] owns the poll engine, the connectivity supervisor, the
//! update coordinator and the transport arbiter. Every call takes the
//! adapters through [`BridgePorts`], so the same driver runs on the device
//! and against the host mocks.
//!
//! ```text
//!   LinkPort ─────┐
//!   SessionPort ──┤   ┌────────────────────────────────────┐
//!   ModbusPort ◀──┼──▶│            BridgeService            │──▶ EventSink
//!   Firmware* ◀───┤   │ Supervisor · PollEngine · Updater  │
//!   SystemPort ◀──┘   └────────────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::bus::BusArbiter;
use crate::catalog::Catalog;
use crate::config::BridgeConfig;
use crate::connectivity::{ConnectivitySupervisor, LinkState};
use crate::health::HealthReport;
use crate::poller::{PollEngine, StepResult};
use crate::publish::{self, CONNECTED_MARKER, DATA_SUFFIX, STATUS_SUFFIX, TopicBuilder};
use crate::scheduler::{self, Timer, TimerId};
use crate::update::{UpdateCoordinator, UpdateOutcome};

use super::commands::{self, InboundCommand, InboundMessage, OversizedMessage};
use super::events::BridgeEvent;
use super::ports::{
    EventSink, FirmwareFlasher, FirmwareSource, LinkPort, ModbusPort, PollControl, PublishPort,
    SessionPort, SystemPort,
};

/// Every adapter the service talks to, borrowed for one call.
///
/// The broker client satisfies both [`SessionPort`] and [`PublishPort`];
/// one field avoids a double mutable borrow.
pub struct BridgePorts<'a, M, L, S, F, O, Y> {
    pub modbus: &'a mut M,
    pub link: &'a mut L,
    pub session: &'a mut S,
    pub source: &'a mut F,
    pub flasher: &'a mut O,
    pub system: &'a mut Y,
}

pub struct BridgeService {
    poller: PollEngine,
    supervisor: ConnectivitySupervisor,
    updater: UpdateCoordinator,
    bus: BusArbiter,
    topics: TopicBuilder,
    step_timer: Timer,
    rest_timer: Timer,
    firmware_timer: Option<Timer>,
    /// Set once an update applied; nothing runs until the restart lands.
    halted: bool,
}

impl BridgeService {
    pub fn new(
        config: &BridgeConfig,
        catalog: Catalog,
        device_id: &str,
        firmware_version: &'static str,
    ) -> Self {
        let t = &config.timing;
        let firmware_timer = config.firmware_checks_enabled().then(|| {
            Timer::periodic(
                TimerId::FirmwareCheck,
                u64::from(t.firmware_check_interval_secs) * 1000,
            )
        });
        Self {
            poller: PollEngine::new(catalog, config.modbus.max_retries),
            supervisor: ConnectivitySupervisor::new(
                u64::from(t.link_retry_ms),
                u64::from(t.session_retry_ms),
                u64::from(t.health_interval_secs) * 1000,
            ),
            updater: UpdateCoordinator::new(firmware_version),
            bus: BusArbiter::new(),
            topics: TopicBuilder::new(&config.mqtt_topic, device_id),
            step_timer: Timer::periodic(TimerId::PollStep, u64::from(t.poll_step_ms)),
            rest_timer: Timer::one_shot(TimerId::ScanRest, u64::from(t.scan_rest_secs) * 1000),
            firmware_timer,
            halted: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        info!(
            "BridgeService: firmware {} starting, {} registers, topic prefix '{}'",
            self.updater.current_version(),
            self.poller.catalog().len(),
            self.topics.topic("")
        );
        sink.emit(&BridgeEvent::Started(self.updater.current_version()));
        self.supervisor.start(now_ms, sink);
        scheduler::arm_immediate(&mut self.step_timer, now_ms, sink);
        if let Some(timer) = self.firmware_timer.as_mut() {
            scheduler::arm(timer, now_ms, sink);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One pass of the driver loop. Never performs more than one poll
    /// transaction; only an update transfer may run longer.
    pub fn tick<M, L, S, F, O, Y>(
        &mut self,
        now_ms: u64,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        M: ModbusPort,
        L: LinkPort,
        S: SessionPort + PublishPort,
        F: FirmwareSource,
        O: FirmwareFlasher,
        Y: SystemPort,
    {
        if self.halted {
            return;
        }

        // 1. Link and session state machines
        let due = self.supervisor.tick(now_ms, ports.link, ports.session, sink);
        if due.link_lost {
            ports.session.disconnect();
        }
        if due.session_established {
            self.bring_up_session(ports.session);
        }

        // 2. Inbound commands
        while let Some(inbound) = ports.session.poll_message() {
            match inbound {
                Ok(msg) => self.route_message(&msg, ports, sink),
                Err(oversized) => self.drop_oversized(&oversized, sink),
            }
            if self.halted {
                return;
            }
        }

        // 3. Poll engine, paced and rested
        self.poll_step(now_ms, ports, sink);

        // 4. Health report
        if due.health_due {
            self.report_health(ports, sink);
        }

        // 5. Periodic firmware check
        let check_due = self
            .firmware_timer
            .as_mut()
            .is_some_and(|timer| timer.poll(now_ms));
        if check_due {
            if self.supervisor.link() == LinkState::Up {
                self.run_update(ports, sink);
            } else {
                debug!("BridgeService: firmware check skipped, link down");
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command<M, L, S, F, O, Y>(
        &mut self,
        cmd: InboundCommand,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        M: ModbusPort,
        L: LinkPort,
        S: SessionPort,
        F: FirmwareSource,
        O: FirmwareFlasher,
        Y: SystemPort,
    {
        match cmd {
            InboundCommand::WriteRegister { name, value } => {
                self.poller.suspend();
                let result = self.poller.write_register(&mut self.bus, ports.modbus, &name, value);
                self.poller.resume();
                match result {
                    Ok(()) => sink.emit(&BridgeEvent::RegisterWritten { name, value }),
                    Err(error) => sink.emit(&BridgeEvent::RegisterWriteFailed { name, error }),
                }
            }
            InboundCommand::Upgrade => self.run_update(ports, sink),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn poller(&self) -> &PollEngine {
        &self.poller
    }

    pub fn supervisor(&self) -> &ConnectivitySupervisor {
        &self.supervisor
    }

    pub fn bus(&self) -> &BusArbiter {
        &self.bus
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    pub fn is_resting(&self) -> bool {
        self.rest_timer.is_armed()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    // ── Internal helpers ──────────────────────────────────────

    fn bring_up_session(&self, session: &mut (impl SessionPort + PublishPort)) {
        let filter = self.topics.action_filter();
        match session.subscribe(&filter) {
            Ok(()) => info!("BridgeService: subscribed to {}", filter),
            Err(e) => warn!("BridgeService: subscribe to {} failed ({})", filter, e),
        }
        let status = self.topics.topic(STATUS_SUFFIX);
        if let Err(e) = session.publish(&status, CONNECTED_MARKER, true) {
            warn!("BridgeService: connect announcement failed ({})", e);
        }
    }

    fn route_message<M, L, S, F, O, Y>(
        &mut self,
        msg: &InboundMessage,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        M: ModbusPort,
        L: LinkPort,
        S: SessionPort,
        F: FirmwareSource,
        O: FirmwareFlasher,
        Y: SystemPort,
    {
        let Some(suffix) = self.topics.action_suffix(&msg.topic) else {
            debug!("BridgeService: ignoring message on {}", msg.topic);
            return;
        };
        info!("BridgeService: command '{}' ({} bytes)", suffix, msg.payload.len());
        match commands::parse(suffix, &msg.payload) {
            Ok(Some(cmd)) => self.handle_command(cmd, ports, sink),
            Ok(None) => {
                warn!("BridgeService: unknown command '{}'", suffix);
                sink.emit(&BridgeEvent::CommandIgnored { suffix: truncate(suffix) });
            }
            Err(e) => {
                warn!("BridgeService: bad '{}' command ({})", suffix, e);
                sink.emit(&BridgeEvent::CommandIgnored { suffix: truncate(suffix) });
            }
        }
    }

    fn drop_oversized(&self, msg: &OversizedMessage, sink: &mut impl EventSink) {
        warn!(
            "BridgeService: dropping oversized message on {} ({} byte payload)",
            msg.topic.as_deref().unwrap_or("<topic over capacity>"),
            msg.payload_len
        );
        let suffix = msg
            .topic
            .as_deref()
            .and_then(|topic| self.topics.action_suffix(topic))
            .unwrap_or("");
        sink.emit(&BridgeEvent::CommandIgnored { suffix: truncate(suffix) });
    }

    fn poll_step<M, L, S, F, O, Y>(
        &mut self,
        now_ms: u64,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        M: ModbusPort,
        S: PublishPort,
    {
        if self.rest_timer.is_armed() && !self.rest_timer.poll(now_ms) {
            return;
        }
        if !self.step_timer.poll(now_ms) {
            return;
        }

        let catalog = *self.poller.catalog();
        let completed = match self.poller.step(&mut self.bus, ports.modbus) {
            StepResult::CycleComplete(samples) => {
                Some((publish::build_snapshot(&catalog, samples), samples.failed_count()))
            }
            StepResult::InProgress => None,
        };
        let Some((fields, failed_registers)) = completed else {
            return;
        };

        let published_fields = fields.len();
        if self.supervisor.is_session_connected() {
            let topic = self.topics.topic(DATA_SUFFIX);
            if let Err(e) = ports.session.publish(&topic, &publish::snapshot_payload(fields), true) {
                warn!("BridgeService: snapshot publish failed ({})", e);
            }
        } else {
            info!("BridgeService: session down, snapshot dropped");
        }
        sink.emit(&BridgeEvent::CycleCompleted { published_fields, failed_registers });

        scheduler::arm(&mut self.rest_timer, now_ms, sink);
    }

    fn report_health<M, L, S, F, O, Y>(
        &mut self,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        S: PublishPort,
        Y: SystemPort,
    {
        let stats = self.poller.stats();
        let report = HealthReport {
            free_heap: ports.system.free_heap(),
            uptime: ports.system.uptime_ms() / 1000,
            link: self.supervisor.link(),
            session: self.supervisor.session(),
            cycles: stats.cycles_completed,
            failed_reads: stats.failed_registers,
            firmware: self.updater.current_version(),
        };
        if self.supervisor.is_session_connected() {
            let topic = self.topics.topic(STATUS_SUFFIX);
            if let Err(e) = ports.session.publish(&topic, &report.to_json(), true) {
                warn!("BridgeService: health publish failed ({})", e);
            }
        }
        sink.emit(&BridgeEvent::Health(report));
    }

    fn run_update<M, L, S, F, O, Y>(
        &mut self,
        ports: &mut BridgePorts<'_, M, L, S, F, O, Y>,
        sink: &mut impl EventSink,
    ) where
        L: LinkPort,
        S: SessionPort,
        F: FirmwareSource,
        O: FirmwareFlasher,
        Y: SystemPort,
    {
        let outcome =
            self.updater
                .check_and_apply(ports.source, ports.flasher, &mut self.poller, &mut self.bus);
        match outcome {
            UpdateOutcome::NoneAvailable => sink.emit(&BridgeEvent::UpdateNotAvailable),
            UpdateOutcome::Failed(e) => sink.emit(&BridgeEvent::UpdateFailed(e)),
            UpdateOutcome::Applied => {
                sink.emit(&BridgeEvent::UpdateApplied);
                info!("BridgeService: restarting into new firmware");
                self.halted = true;
                ports.session.disconnect();
                ports.link.disconnect();
                ports.system.restart();
            }
        }
    }
}

fn truncate(s: &str) -> heapless::String<32> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
