//! Events the note-acceptor engine publishes to external collaborators.
//!
//! Host-communication and operator layers consume these; nothing in the
//! engine depends on who listens. Events are serializable so sinks can
//! forward them over whatever wire they like.

use chrono::{DateTime, Utc};
use serde::Serialize;

use egm_core::faults::FaultReport;
use egm_core::{FirmwareInfo, NoteValue};

use crate::faults::ValidatorFault;
use crate::state::ValidatorState;

/// Why a note went back to the patron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    /// The host asked for the return.
    HostRequest,
    /// No host decision arrived within the escrow window.
    EscrowTimeout,
    /// The note reached escrow after acceptance had been disabled.
    AcceptanceDisabled,
    /// The device held the document across a power interruption.
    PowerUpRecovery,
}

/// Semantic events emitted by the note-acceptor engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ValidatorEvent {
    /// Link established and identity discovered.
    Connected { firmware: FirmwareInfo },
    /// The semantic state changed (edge triggered).
    StateChanged {
        from: ValidatorState,
        to: ValidatorState,
        at: DateTime<Utc>,
    },
    /// The post-initialization configuration sequence completed.
    Configured,
    /// A note entered escrow.
    NoteEscrowed {
        escrow_code: u8,
        value: Option<NoteValue>,
    },
    /// A note was irrevocably accepted (vend-valid acknowledged).
    ///
    /// `value` is `None` for a document recovered from the stacker path
    /// across a power interruption, where no escrow report preceded it.
    NoteAccepted { value: Option<NoteValue> },
    /// A note went back to the patron.
    NoteReturned { reason: ReturnReason },
    /// The active-fault set changed; an empty report is the all-clear.
    Fault { report: FaultReport<ValidatorFault> },
}
