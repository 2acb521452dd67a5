//! Events the printer engine publishes to external collaborators.

use chrono::{DateTime, Utc};
use serde::Serialize;

use egm_core::FirmwareInfo;
use egm_core::faults::FaultReport;

use crate::status::{PrinterFault, PrinterState, PrinterStatus};
use crate::templates::{RegionId, TemplateId};

/// Semantic events emitted by the printer engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PrinterEvent {
    /// Link established and identity discovered.
    Connected { firmware: FirmwareInfo },
    /// The engine state changed.
    StateChanged {
        from: PrinterState,
        to: PrinterState,
        at: DateTime<Utc>,
    },
    /// A region definition was acknowledged and cached.
    RegionCached { id: RegionId },
    /// A template definition was acknowledged and cached.
    TemplateCached { id: TemplateId },
    /// A print was refused without transmission; the current status is
    /// echoed back unchanged.
    PrintRefused { status: PrinterStatus },
    /// A ticket finished; `complete` is false when the device flagged the
    /// render as incomplete.
    TicketCompleted { complete: bool },
    /// The active-fault set changed; an empty report is the all-clear.
    Fault { report: FaultReport<PrinterFault> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tags() {
        let event = PrinterEvent::TicketCompleted { complete: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"ticket_completed\""));
    }
}
