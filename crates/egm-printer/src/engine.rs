//! Ticket-printer protocol engine.
//!
//! The printer mirrors the note-acceptor engine structurally (one owner,
//! one outstanding exchange, polled status) but its state machine is
//! definition-driven: regions and templates are cached on the device
//! before any print referencing them can succeed, and a print is refused
//! outright (current status echoed, nothing transmitted) when a disabling
//! fault is active, the printer is disabled, or paper is off top-of-form.
//!
//! Jurisdiction overrides are applied at the wire boundary: definitions
//! and print commands leave this engine already remapped, so the device
//! only ever sees its own template ids and the overridden region
//! geometry.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use egm_core::constants::DEFAULT_POLL_INTERVAL_MS;
use egm_core::{Error, FaultAggregator, FirmwareInfo, Result};
use egm_protocol::{PRINTER_SCHEMA, PrinterReport, chunk_report_payload};
use egm_session::{CommandEngine, LifecyclePhase, SessionTiming, Transport};

use crate::events::PrinterEvent;
use crate::layout::{compose_lines, escape_control_chars};
use crate::overrides::{OverrideRule, OverrideSet};
use crate::status::{PrinterFault, PrinterState, PrinterStatus};
use crate::templates::{RegionDef, TemplateCache, TemplateDef, TemplateId};

/// Protocol family identifier for the override resolver.
const PROTOCOL_NAME: &str = "gds";

/// Expected acknowledgement report id.
const ACK: u8 = 0x40;

/// Everything the platform decides about one ticket printer.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Status polling cadence.
    pub poll_interval: Duration,
    /// Response windows for the transport session.
    pub timing: SessionTiming,
    /// Fixed per-line character budget for ticket text.
    pub chars_per_line: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timing: SessionTiming::default(),
            chars_per_line: 40,
        }
    }
}

/// One ticket to render: a platform template plus three text columns.
#[derive(Debug, Clone, Default)]
pub struct PrintJob {
    pub template: TemplateId,
    pub left: Vec<String>,
    pub center: Vec<String>,
    pub right: Vec<String>,
}

/// What became of a print request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    /// The job went to the device; completion arrives via polled status.
    Started,
    /// Refused without transmission; the current status is echoed back.
    Refused(PrinterStatus),
}

/// Protocol engine for one ticket printer.
pub struct PrinterEngine<T: Transport> {
    engine: CommandEngine<T>,
    config: PrinterConfig,
    overrides: OverrideSet,
    events: mpsc::UnboundedSender<PrinterEvent>,

    cache: TemplateCache,
    status: PrinterStatus,
    state: PrinterState,
    last_flags: Option<[u8; 2]>,
    faults: FaultAggregator<PrinterFault>,
    firmware: Option<FirmwareInfo>,
}

impl<T: Transport> PrinterEngine<T> {
    pub fn new(
        transport: T,
        config: PrinterConfig,
        overrides: OverrideSet,
        events: mpsc::UnboundedSender<PrinterEvent>,
    ) -> Self {
        let engine = CommandEngine::new(transport, PRINTER_SCHEMA, config.timing);
        Self {
            engine,
            config,
            overrides,
            events,
            cache: TemplateCache::new(),
            status: PrinterStatus::default(),
            state: PrinterState::AwaitingDefinitions,
            last_flags: None,
            faults: FaultAggregator::new(),
            firmware: None,
        }
    }

    // ------------------------------------------------------------------
    // Read-only surface
    // ------------------------------------------------------------------

    pub fn state(&self) -> PrinterState {
        self.state
    }

    pub fn status(&self) -> PrinterStatus {
        self.status
    }

    pub fn active_faults(&self) -> &[PrinterFault] {
        self.faults.active()
    }

    pub fn firmware(&self) -> Option<&FirmwareInfo> {
        self.firmware.as_ref()
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Establish the link and discover firmware identity.
    pub async fn open(&mut self) -> Result<()> {
        self.engine.set_phase(LifecyclePhase::Initializing);

        let reply = self
            .engine
            .query_info(PrinterReport::FirmwareQuery.as_u8(), &[])
            .await?;
        let firmware = FirmwareInfo::new(
            PROTOCOL_NAME,
            String::from_utf8_lossy(&reply.payload).trim().to_string(),
        );
        info!(version = %firmware.version, "printer identified");

        self.firmware = Some(firmware.clone());
        self.engine.set_phase(LifecyclePhase::Operating);
        self.emit(PrinterEvent::Connected { firmware });
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.engine.close().await
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Define a region on the device and cache it.
    ///
    /// The jurisdiction override replaces the definition before anything
    /// reaches the wire; the cache mirrors what was actually sent.
    pub async fn define_region(&mut self, def: RegionDef) -> Result<()> {
        let def = match self.rule_region_override(&def) {
            Some(replacement) => {
                debug!(region = %def.id, "region definition replaced by override rule");
                replacement
            }
            None => def,
        };

        self.send_definition(PrinterReport::DefineRegion, &def.encode())
            .await?;
        self.emit(PrinterEvent::RegionCached { id: def.id });
        self.cache.insert_region(def);
        Ok(())
    }

    /// Define a template on the device and cache it.
    pub async fn define_template(&mut self, mut def: TemplateDef) -> Result<()> {
        def.id = self.map_template(def.id);

        self.send_definition(PrinterReport::DefineTemplate, &def.encode())
            .await?;
        self.emit(PrinterEvent::TemplateCached { id: def.id });
        self.cache.insert_template(def);

        if self.state == PrinterState::AwaitingDefinitions {
            self.set_state(PrinterState::Ready);
        }
        Ok(())
    }

    async fn send_definition(&mut self, report: PrinterReport, payload: &[u8]) -> Result<()> {
        for part in chunk_report_payload(payload)? {
            let acked = self
                .engine
                .send_expecting_ack(report.as_u8(), &part, ACK)
                .await?;
            if !acked {
                return Err(Error::ConfigurationFailed(format!(
                    "{report} definition not acknowledged"
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    /// Render a ticket through a cached template.
    ///
    /// Refusals echo the current status and transmit nothing: any
    /// disabling fault, a disabled printer, paper off top-of-form, or a
    /// template/region missing from the cache.
    pub async fn print(&mut self, job: &PrintJob) -> Result<PrintOutcome> {
        if !self.status.can_print() {
            info!(status = ?self.status, "print refused by status gate");
            return Ok(self.refuse());
        }
        if self.state == PrinterState::PrintInProgress {
            info!("print refused, a ticket is already in flight");
            return Ok(self.refuse());
        }

        let device_template = self.map_template(job.template);
        if self.cache.template(device_template).is_none()
            || !self.cache.template_is_complete(device_template)
        {
            info!(template = %device_template, "print refused, template not fully defined");
            return Ok(self.refuse());
        }

        let payload = self.render(job, device_template);
        for part in chunk_report_payload(&payload)? {
            // Operational: sent once. A missing ack is logged by the
            // command engine; the next status poll reconciles.
            self.engine
                .send_expecting_ack(PrinterReport::PrintTicket.as_u8(), &part, ACK)
                .await?;
        }

        self.set_state(PrinterState::PrintInProgress);
        Ok(PrintOutcome::Started)
    }

    fn refuse(&self) -> PrintOutcome {
        self.emit(PrinterEvent::PrintRefused {
            status: self.status,
        });
        PrintOutcome::Refused(self.status)
    }

    /// Build the print payload: substituted column text laid out against
    /// the per-line budget, then control-escaped.
    fn render(&self, job: &PrintJob, device_template: TemplateId) -> Vec<u8> {
        let rule = self.active_rule();
        let substitute = |texts: &[String]| -> Vec<String> {
            texts
                .iter()
                .map(|t| rule.map_or_else(|| t.clone(), |r| r.substitute(t)))
                .collect()
        };

        let lines = compose_lines(
            &substitute(&job.left),
            &substitute(&job.center),
            &substitute(&job.right),
            self.config.chars_per_line,
        );
        let text = escape_control_chars(&lines.join("\n"));
        format!("P|{}|{}", device_template, text).into_bytes()
    }

    // ------------------------------------------------------------------
    // Polling loop
    // ------------------------------------------------------------------

    /// One heartbeat: status request, flag routing, completion detection.
    pub async fn poll_tick(&mut self) -> Result<bool> {
        let reply = match self
            .engine
            .send_command(PrinterReport::StatusRequest.as_u8(), &[])
            .await
        {
            Ok(reply) => reply,
            Err(Error::ResponseTimeout { .. }) => {
                debug!("status poll timed out");
                return Ok(false);
            }
            Err(e) if e.is_framing() => {
                warn!(error = %e, "discarding malformed status frame");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if PrinterReport::from_u8(reply.code) != PrinterReport::StatusReport {
            warn!(code = reply.code, "unexpected report while polling, ignoring");
            return Ok(false);
        }

        let flags: [u8; 2] = match reply.payload.as_slice() {
            [a, b, ..] => [*a, *b],
            _ => {
                warn!("status report payload too short, ignoring");
                return Ok(false);
            }
        };

        // Flags are levels; identical consecutive reports carry no news.
        if self.last_flags == Some(flags) {
            return Ok(true);
        }
        self.last_flags = Some(flags);

        let status = PrinterStatus::from_report(&flags)?;
        self.apply_status(status);
        Ok(true)
    }

    fn apply_status(&mut self, status: PrinterStatus) {
        let previous = self.status;
        self.status = status;

        let active = status.active_faults();
        if active.is_empty() {
            if let Some(report) = self.faults.clear() {
                self.emit(PrinterEvent::Fault { report });
            }
        } else {
            for fault in active {
                if let Some(report) = self.faults.raise(fault) {
                    warn!(%fault, "printer fault");
                    self.emit(PrinterEvent::Fault { report });
                }
            }
        }

        // A ticket completes when the in-progress flag falls.
        if self.state == PrinterState::PrintInProgress
            && previous.print_in_progress
            && !status.print_in_progress
        {
            let complete = !status.last_ticket_incomplete;
            self.emit(PrinterEvent::TicketCompleted { complete });
            self.set_state(PrinterState::Ready);
        }
    }

    // ------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------

    fn active_rule(&self) -> Option<&OverrideRule> {
        let firmware = self.firmware.as_ref()?;
        self.overrides.resolve(&firmware.protocol, &firmware.version)
    }

    fn map_template(&self, id: TemplateId) -> TemplateId {
        self.active_rule().map_or(id, |rule| rule.map_template(id))
    }

    fn rule_region_override(&self, def: &RegionDef) -> Option<RegionDef> {
        self.active_rule()
            .and_then(|rule| rule.region_override(def.id))
            .cloned()
    }

    fn set_state(&mut self, to: PrinterState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(%from, %to, "state transition");
        self.emit(PrinterEvent::StateChanged {
            from,
            to,
            at: Utc::now(),
        });
    }

    fn emit(&self, event: PrinterEvent) {
        // A gone sink must not stall the device loop.
        let _ = self.events.send(event);
    }
}
