//! Note-acceptor protocol engine.
//!
//! One engine owns one device: the transport session, the semantic state,
//! the fault aggregator and the note table all live here and are mutated
//! only by this engine's methods, strictly in the order replies arrive.
//! The polling loop drives [`poll_tick`](ValidatorEngine::poll_tick) at a
//! fixed cadence; host requests (enable, accept, return) come in through
//! the same loop via the service layer, which is what keeps the
//! one-outstanding-request rule airtight.
//!
//! Timing rules implemented here:
//!
//! - a note in escrow past the configured window is returned by the
//!   engine itself on the next tick; currency is never held hostage to a
//!   silent host;
//! - repeated poll timeouts escalate to a `CommunicationError` fault;
//! - enable/disable requests during initialization or power-up handling
//!   are latched and replayed once bring-up completes.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use egm_core::constants::COMM_ERROR_THRESHOLD;
use egm_core::{Error, FaultAggregator, FirmwareInfo, NoteValue, Result};
use egm_protocol::{VALIDATOR_SCHEMA, ValidatorCommand, ValidatorStatus};
use egm_session::{CommandEngine, LifecyclePhase, Transport};

use crate::config::ValidatorConfig;
use crate::events::{ReturnReason, ValidatorEvent};
use crate::faults::ValidatorFault;
use crate::note_table::NoteTable;
use crate::state::ValidatorState;

/// Protocol family identifier reported alongside the firmware version.
const PROTOCOL_NAME: &str = "bna2";

/// Documents the device held across a power interruption resolve into a
/// deferred semantic event once bring-up completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerUpRecovery {
    /// Document was still in the acceptor head: it goes back.
    ReturnDocument,
    /// Document was already in the stacker path: it counts as accepted.
    AcceptDocument,
}

/// Protocol engine for one note acceptor.
pub struct ValidatorEngine<T: Transport> {
    engine: CommandEngine<T>,
    config: ValidatorConfig,
    events: mpsc::UnboundedSender<ValidatorEvent>,

    state: ValidatorState,
    last_status: Option<ValidatorStatus>,
    faults: FaultAggregator<ValidatorFault>,
    note_table: NoteTable,
    firmware: Option<FirmwareInfo>,

    configured: bool,
    handling_power_up: bool,
    power_up_recovery: Option<PowerUpRecovery>,
    pending_enable: Option<bool>,
    acceptance_enabled: bool,

    escrow_entered: Option<Instant>,
    escrowed_value: Option<NoteValue>,
    consecutive_timeouts: u32,
}

impl<T: Transport> ValidatorEngine<T> {
    pub fn new(
        transport: T,
        config: ValidatorConfig,
        events: mpsc::UnboundedSender<ValidatorEvent>,
    ) -> Self {
        let engine = CommandEngine::new(transport, VALIDATOR_SCHEMA, config.timing);
        Self {
            engine,
            config,
            events,
            state: ValidatorState::Initializing,
            last_status: None,
            faults: FaultAggregator::new(),
            note_table: NoteTable::default(),
            firmware: None,
            configured: false,
            handling_power_up: false,
            power_up_recovery: None,
            pending_enable: None,
            acceptance_enabled: false,
            escrow_entered: None,
            escrowed_value: None,
            consecutive_timeouts: 0,
        }
    }

    // ------------------------------------------------------------------
    // Read-only surface
    // ------------------------------------------------------------------

    pub fn state(&self) -> ValidatorState {
        self.state
    }

    pub fn active_faults(&self) -> &[ValidatorFault] {
        self.faults.active()
    }

    pub fn firmware(&self) -> Option<&FirmwareInfo> {
        self.firmware.as_ref()
    }

    pub fn note_table(&self) -> &NoteTable {
        &self.note_table
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Establish the link: discover identity and build the note table.
    ///
    /// Runs against the initialization response window. Identity queries
    /// are informational and retried up to the fixed bound; exhausting it
    /// fails the open.
    pub async fn open(&mut self) -> Result<()> {
        self.engine.set_phase(LifecyclePhase::Initializing);

        let version = self
            .engine
            .query_info(ValidatorCommand::VersionRequest.as_u8(), &[])
            .await?;
        let boot = self
            .engine
            .query_info(ValidatorCommand::BootVersionRequest.as_u8(), &[])
            .await?;

        let mut firmware = FirmwareInfo::new(PROTOCOL_NAME, printable(&version.payload));
        firmware.boot_version = Some(printable(&boot.payload));
        info!(version = %firmware.version, "note acceptor identified");

        let assignment = self
            .engine
            .query_info(ValidatorCommand::CurrencyAssignRequest.as_u8(), &[])
            .await?;
        self.note_table =
            NoteTable::from_assignment(&assignment.payload, &self.config.currency_map)?;
        info!(entries = self.note_table.len(), "note table built");

        self.firmware = Some(firmware.clone());
        self.engine.set_phase(LifecyclePhase::Operating);
        self.emit(ValidatorEvent::Connected { firmware });
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.engine.close().await
    }

    // ------------------------------------------------------------------
    // Host requests (side channel)
    // ------------------------------------------------------------------

    /// Enable or inhibit note acceptance.
    ///
    /// Sent immediately in steady state. During initialization or
    /// power-up handling the request is latched, not dropped, and
    /// replayed once bring-up completes.
    pub async fn enable(&mut self, enable: bool) -> Result<()> {
        if self.state.defers_requests() || self.handling_power_up {
            debug!(enable, "acceptance request latched until bring-up completes");
            self.pending_enable = Some(enable);
            return Ok(());
        }
        self.set_acceptance(enable).await
    }

    /// Stack the escrowed note.
    pub async fn accept(&mut self) -> Result<()> {
        if !self.state.holds_note() {
            warn!(state = %self.state, "accept requested with no note in escrow");
            return Ok(());
        }
        // Decision made; the escrow window no longer applies.
        self.escrow_entered = None;
        self.engine
            .send_expecting_ack(ValidatorCommand::Stack.as_u8(), &[], ACK)
            .await?;
        Ok(())
    }

    /// Return the escrowed note to the patron.
    pub async fn return_note(&mut self) -> Result<()> {
        if !self.state.holds_note() {
            warn!(state = %self.state, "return requested with no note in escrow");
            return Ok(());
        }
        self.issue_return(ReturnReason::HostRequest).await
    }

    // ------------------------------------------------------------------
    // Polling loop
    // ------------------------------------------------------------------

    /// One heartbeat: status request, response routing, escrow liveness.
    ///
    /// Returns whether a status was processed this tick. Timeouts and
    /// framing problems are absorbed here; only a dead link propagates.
    pub async fn poll_tick(&mut self) -> Result<bool> {
        // Liveness: an escrowed note whose decision window lapsed goes
        // back now, before the next status read.
        if self.state.holds_note()
            && let Some(entered) = self.escrow_entered
            && entered.elapsed() >= self.config.escrow_timeout
        {
            warn!("escrow window lapsed without a host decision, returning note");
            self.issue_return(ReturnReason::EscrowTimeout).await?;
            return Ok(false);
        }

        match self
            .engine
            .send_command(ValidatorCommand::StatusRequest.as_u8(), &[])
            .await
        {
            Ok(reply) => {
                self.consecutive_timeouts = 0;
                let status = ValidatorStatus::from_u8(reply.code);
                self.handle_status(status, &reply.payload).await?;
                Ok(true)
            }
            Err(Error::ResponseTimeout { .. }) => {
                self.consecutive_timeouts += 1;
                debug!(count = self.consecutive_timeouts, "status poll timed out");
                if self.consecutive_timeouts >= COMM_ERROR_THRESHOLD {
                    self.raise_fault(ValidatorFault::CommunicationError);
                }
                Ok(false)
            }
            Err(e) if e.is_framing() => {
                warn!(error = %e, "discarding malformed status frame");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Status routing
    // ------------------------------------------------------------------

    async fn handle_status(&mut self, status: ValidatorStatus, payload: &[u8]) -> Result<()> {
        if status.is_error_subset() {
            let fault = ValidatorFault::from_status(status).expect("error subset maps to fault");
            self.raise_fault(fault);
            return Ok(());
        }

        match status {
            ValidatorStatus::Ack => {
                // Well-framed but meaningless outside an exchange.
                debug!("stray acknowledgement outside an exchange, ignoring");
                return Ok(());
            }
            ValidatorStatus::Unknown(code) => {
                warn!(code, "unrecognized status byte, continuing to poll");
                return Ok(());
            }
            _ => {}
        }

        // The device cannot report a normal state and a standing fault in
        // the same answer: a state report is the all-clear.
        if let Some(report) = self.faults.clear() {
            self.emit(ValidatorEvent::Fault { report });
        }

        // Edge triggered: the same report again is not a transition.
        if self.last_status == Some(status) {
            return Ok(());
        }
        self.last_status = Some(status);

        let Some(to) = ValidatorState::from_status(status) else {
            return Ok(());
        };
        self.transition(to, payload).await
    }

    async fn transition(&mut self, to: ValidatorState, payload: &[u8]) -> Result<()> {
        let from = self.state;
        self.state = to;
        info!(%from, %to, "state transition");
        self.emit(ValidatorEvent::StateChanged {
            from,
            to,
            at: Utc::now(),
        });

        match to {
            ValidatorState::Initializing => self.configure().await?,
            ValidatorState::PowerUp => self.begin_power_up(None),
            ValidatorState::PowerUpBillInAcceptor => {
                self.begin_power_up(Some(PowerUpRecovery::ReturnDocument))
            }
            ValidatorState::PowerUpBillInStacker => {
                self.begin_power_up(Some(PowerUpRecovery::AcceptDocument))
            }
            ValidatorState::Escrow => self.enter_escrow(payload).await?,
            ValidatorState::VendValid => self.acknowledge_vend().await?,
            _ => {}
        }

        if !to.defers_requests() {
            self.finish_bring_up().await?;
        }
        Ok(())
    }

    /// Run the mandatory post-initialization setup sequence.
    ///
    /// Every step must be acknowledged; a refused or silent step fails
    /// this attempt, and the next `Initializing` report retries. Success
    /// is remembered; later transitions are only "normal" once this has
    /// completed.
    async fn configure(&mut self) -> Result<()> {
        self.engine.set_phase(LifecyclePhase::Initializing);
        let outcome = self.run_configuration().await;
        self.engine.set_phase(LifecyclePhase::Operating);

        match outcome {
            Ok(()) => {
                self.configured = true;
                self.emit(ValidatorEvent::Configured);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                self.configured = false;
                warn!(error = %e, "configuration sequence failed, will retry on next initialization");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run_configuration(&mut self) -> Result<()> {
        let accept_mask = if self.acceptance_enabled {
            self.config.denomination_inhibit_mask
        } else {
            0xFF
        };
        let steps: [(ValidatorCommand, u8); 5] = [
            (ValidatorCommand::InhibitSet, accept_mask),
            (ValidatorCommand::SecuritySet, self.config.security_mask),
            (
                ValidatorCommand::CommunicationModeSet,
                self.config.communication_mode,
            ),
            (
                ValidatorCommand::BarcodeSet,
                u8::from(self.config.barcode_enabled),
            ),
            (ValidatorCommand::BarInhibitSet, self.config.bar_inhibit_mask),
        ];

        for (command, value) in steps {
            let acked = self
                .engine
                .send_expecting_ack(command.as_u8(), &[value], ACK)
                .await?;
            if !acked {
                return Err(Error::ConfigurationFailed(format!(
                    "{command} not acknowledged"
                )));
            }
        }

        // The currency set can change across a reset.
        let assignment = self
            .engine
            .query_info(ValidatorCommand::CurrencyAssignRequest.as_u8(), &[])
            .await?;
        if self.note_table.differs_from(&assignment.payload) {
            self.note_table =
                NoteTable::from_assignment(&assignment.payload, &self.config.currency_map)?;
            info!(entries = self.note_table.len(), "note table rebuilt");
        }
        Ok(())
    }

    fn begin_power_up(&mut self, recovery: Option<PowerUpRecovery>) {
        self.handling_power_up = true;
        self.configured = false;
        self.power_up_recovery = recovery;
        self.escrow_entered = None;
        self.escrowed_value = None;
    }

    async fn enter_escrow(&mut self, payload: &[u8]) -> Result<()> {
        let escrow_code = payload.first().copied().unwrap_or_default();

        if !self.acceptance_enabled {
            // A disable that raced the insertion wins: the device must not
            // finalize an acceptance that started before the inhibit took
            // effect.
            info!(escrow_code, "escrow while inhibited, returning immediately");
            return self.issue_return(ReturnReason::AcceptanceDisabled).await;
        }

        let value = self.note_table.lookup(escrow_code);
        if value.is_none() {
            warn!(escrow_code, "escrow code missing from note table");
        }
        self.escrow_entered = Some(Instant::now());
        self.escrowed_value = value;
        self.emit(ValidatorEvent::NoteEscrowed { escrow_code, value });
        Ok(())
    }

    /// Vend-valid is the one report that must be acknowledged before the
    /// note counts as accepted.
    async fn acknowledge_vend(&mut self) -> Result<()> {
        self.engine
            .send_expecting_ack(ValidatorCommand::Ack.as_u8(), &[], ACK)
            .await?;
        let value = self.escrowed_value.take();
        self.escrow_entered = None;
        self.emit(ValidatorEvent::NoteAccepted { value });
        Ok(())
    }

    /// Resolve deferred work once initialization/power-up handling ends.
    async fn finish_bring_up(&mut self) -> Result<()> {
        if self.handling_power_up {
            self.handling_power_up = false;
            match self.power_up_recovery.take() {
                Some(PowerUpRecovery::ReturnDocument) => {
                    self.emit(ValidatorEvent::NoteReturned {
                        reason: ReturnReason::PowerUpRecovery,
                    });
                }
                Some(PowerUpRecovery::AcceptDocument) => {
                    self.emit(ValidatorEvent::NoteAccepted { value: None });
                }
                None => {}
            }
        }
        if let Some(enable) = self.pending_enable.take() {
            self.set_acceptance(enable).await?;
        }
        Ok(())
    }

    async fn issue_return(&mut self, reason: ReturnReason) -> Result<()> {
        self.escrow_entered = None;
        self.escrowed_value = None;
        self.engine
            .send_expecting_ack(ValidatorCommand::Return.as_u8(), &[], ACK)
            .await?;
        self.emit(ValidatorEvent::NoteReturned { reason });
        Ok(())
    }

    async fn set_acceptance(&mut self, enable: bool) -> Result<()> {
        let mask = if enable {
            self.config.denomination_inhibit_mask
        } else {
            0xFF
        };
        self.engine
            .send_expecting_ack(ValidatorCommand::InhibitSet.as_u8(), &[mask], ACK)
            .await?;
        self.acceptance_enabled = enable;
        info!(enable, "acceptance updated");
        Ok(())
    }

    fn raise_fault(&mut self, fault: ValidatorFault) {
        if let Some(report) = self.faults.raise(fault) {
            warn!(%fault, "device fault");
            self.emit(ValidatorEvent::Fault { report });
        }
    }

    fn emit(&self, event: ValidatorEvent) {
        // A gone sink must not stall the device loop.
        let _ = self.events.send(event);
    }
}

/// Expected acknowledgement byte for commands that define one.
const ACK: u8 = 0x50;

fn printable(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use egm_session::MockLink;

    fn engine() -> (
        ValidatorEngine<MockLink>,
        egm_session::MockLinkHandle,
        mpsc::UnboundedReceiver<ValidatorEvent>,
    ) {
        let (link, device) = MockLink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        (ValidatorEngine::new(link, ValidatorConfig::default(), tx), device, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ValidatorEvent>) -> Vec<ValidatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn repeated_status_is_one_transition() {
        let (mut engine, _device, mut rx) = engine();

        engine
            .handle_status(ValidatorStatus::Idling, &[])
            .await
            .unwrap();
        engine
            .handle_status(ValidatorStatus::Idling, &[])
            .await
            .unwrap();

        let changes = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ValidatorEvent::StateChanged { .. }))
            .count();
        assert_eq!(changes, 1, "level reports must be edge triggered");
        assert_eq!(engine.state(), ValidatorState::EnabledIdle);
    }

    #[tokio::test]
    async fn error_subset_routes_to_faults_not_state() {
        let (mut engine, _device, mut rx) = engine();
        engine
            .handle_status(ValidatorStatus::Idling, &[])
            .await
            .unwrap();
        drain(&mut rx);

        engine
            .handle_status(ValidatorStatus::JamInAcceptor, &[])
            .await
            .unwrap();

        assert_eq!(engine.state(), ValidatorState::EnabledIdle);
        assert_eq!(engine.active_faults(), &[ValidatorFault::JamInAcceptor]);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, ValidatorEvent::Fault { .. }))
        );
    }

    #[tokio::test]
    async fn state_report_clears_standing_faults() {
        let (mut engine, _device, mut rx) = engine();
        engine
            .handle_status(ValidatorStatus::StackerOpen, &[])
            .await
            .unwrap();
        drain(&mut rx);

        engine
            .handle_status(ValidatorStatus::Idling, &[])
            .await
            .unwrap();

        assert!(engine.active_faults().is_empty());
        let clears: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ValidatorEvent::Fault { report } if report.is_clear()))
            .collect();
        assert_eq!(clears.len(), 1, "one consolidated all-clear report");
    }

    #[tokio::test]
    async fn duplicate_fault_reports_once() {
        let (mut engine, _device, mut rx) = engine();

        engine
            .handle_status(ValidatorStatus::StackerFull, &[])
            .await
            .unwrap();
        engine
            .handle_status(ValidatorStatus::StackerFull, &[])
            .await
            .unwrap();

        let faults = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ValidatorEvent::Fault { .. }))
            .count();
        assert_eq!(faults, 1);
    }

    #[tokio::test]
    async fn unknown_status_is_ignored() {
        let (mut engine, _device, mut rx) = engine();

        engine
            .handle_status(ValidatorStatus::Unknown(0xEE), &[])
            .await
            .unwrap();

        assert_eq!(engine.state(), ValidatorState::Initializing);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn enable_during_power_up_is_latched() {
        let (mut engine, mut device, _rx) = engine();
        engine
            .handle_status(ValidatorStatus::PowerUp, &[])
            .await
            .unwrap();

        engine.enable(true).await.unwrap();
        assert!(
            device.try_next_sent().is_none(),
            "inhibit command must not be sent mid power-up"
        );
        assert_eq!(engine.pending_enable, Some(true));
    }
}
