//! Note-acceptor fault vocabulary and supersession rules.

use std::fmt;

use serde::Serialize;

use egm_core::faults::FaultCode;
use egm_protocol::ValidatorStatus;

/// Hardware faults a note acceptor reports through its error subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorFault {
    StackerFull,
    StackerOpen,
    JamInAcceptor,
    JamInStacker,
    Pause,
    Cheated,
    Failure,
    CommunicationError,
}

impl ValidatorFault {
    /// Map an error-subset status onto its fault code.
    pub fn from_status(status: ValidatorStatus) -> Option<Self> {
        match status {
            ValidatorStatus::StackerFull => Some(ValidatorFault::StackerFull),
            ValidatorStatus::StackerOpen => Some(ValidatorFault::StackerOpen),
            ValidatorStatus::JamInAcceptor => Some(ValidatorFault::JamInAcceptor),
            ValidatorStatus::JamInStacker => Some(ValidatorFault::JamInStacker),
            ValidatorStatus::Pause => Some(ValidatorFault::Pause),
            ValidatorStatus::Cheated => Some(ValidatorFault::Cheated),
            ValidatorStatus::Failure => Some(ValidatorFault::Failure),
            ValidatorStatus::CommunicationError => Some(ValidatorFault::CommunicationError),
            _ => None,
        }
    }
}

impl FaultCode for ValidatorFault {
    /// The stacking mechanism cannot report full or jammed while also
    /// reporting its door open; the newer report supersedes.
    fn supersedes(&self) -> &'static [Self] {
        match self {
            ValidatorFault::StackerFull => &[ValidatorFault::StackerOpen],
            ValidatorFault::JamInStacker => &[ValidatorFault::StackerOpen],
            _ => &[],
        }
    }
}

impl fmt::Display for ValidatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
