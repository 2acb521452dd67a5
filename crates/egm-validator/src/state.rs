//! Note-acceptor semantic states.
//!
//! The device is authoritative: states are entered because the hardware
//! reported them, not because the host decided to move. What the engine
//! adds on top is edge triggering (the same report twice is one
//! transition) and the entry actions: configuration on `Initializing`,
//! the escrow timer, the vend-valid acknowledgement, power-up recovery.
//!
//! ```text
//! Initializing ──> EnabledIdle/DisabledInhibited ⇄ Escrow
//!                        ^                           │
//!                        │      ┌────────────────────┼─────────────┐
//!                        └──────┤ Stacking→VendValid │ Rejecting   │
//!                               │ →Stacked           │ Returning   │
//!                               └────────────────────┴─ Holding ───┘
//! ```
//!
//! The `PowerUp` family is entered only at link re-establishment. There
//! is no terminal state; the machine runs for the device's operating
//! lifetime.

use std::fmt;

use serde::{Deserialize, Serialize};

use egm_protocol::ValidatorStatus;

/// Current semantic state of a note acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorState {
    /// Device is running its startup/configuration sequence.
    Initializing,
    /// Ready and willing to accept notes.
    EnabledIdle,
    /// Ready but acceptance is inhibited.
    DisabledInhibited,
    /// A note is being drawn in and validated.
    Accepting,
    /// A validated note is held pending a host decision.
    Escrow,
    /// The note is travelling to the cashbox.
    Stacking,
    /// The note cleared validation and stacking can be credited, once
    /// acknowledged.
    VendValid,
    /// The note is in the cashbox.
    Stacked,
    /// The note failed validation and is being spat back.
    Rejecting,
    /// The note is being returned to the patron.
    Returning,
    /// The escrowed note is being held another cycle.
    Holding,
    /// Power restored with the transport empty.
    PowerUp,
    /// Power restored with a document still in the acceptor head.
    PowerUpBillInAcceptor,
    /// Power restored with a document in the stacker path.
    PowerUpBillInStacker,
}

impl ValidatorState {
    /// Map a state-subset status report onto the semantic state.
    ///
    /// Error-subset, acknowledgement and unknown statuses have no state
    /// mapping; they are routed elsewhere by the engine.
    pub fn from_status(status: ValidatorStatus) -> Option<Self> {
        match status {
            ValidatorStatus::Initializing => Some(ValidatorState::Initializing),
            ValidatorStatus::Idling => Some(ValidatorState::EnabledIdle),
            ValidatorStatus::Inhibit => Some(ValidatorState::DisabledInhibited),
            ValidatorStatus::Accepting => Some(ValidatorState::Accepting),
            ValidatorStatus::Escrow => Some(ValidatorState::Escrow),
            ValidatorStatus::Stacking => Some(ValidatorState::Stacking),
            ValidatorStatus::VendValid => Some(ValidatorState::VendValid),
            ValidatorStatus::Stacked => Some(ValidatorState::Stacked),
            ValidatorStatus::Rejecting => Some(ValidatorState::Rejecting),
            ValidatorStatus::Returning => Some(ValidatorState::Returning),
            ValidatorStatus::Holding => Some(ValidatorState::Holding),
            ValidatorStatus::PowerUp => Some(ValidatorState::PowerUp),
            ValidatorStatus::PowerUpBillInAcceptor => Some(ValidatorState::PowerUpBillInAcceptor),
            ValidatorStatus::PowerUpBillInStacker => Some(ValidatorState::PowerUpBillInStacker),
            _ => None,
        }
    }

    /// Whether a note is currently held pending a host decision.
    pub fn holds_note(&self) -> bool {
        matches!(self, ValidatorState::Escrow | ValidatorState::Holding)
    }

    /// Whether this state is part of the power-up family.
    pub fn is_power_up(&self) -> bool {
        matches!(
            self,
            ValidatorState::PowerUp
                | ValidatorState::PowerUpBillInAcceptor
                | ValidatorState::PowerUpBillInStacker
        )
    }

    /// Whether initialization/power-up handling is in progress in this
    /// state; side-channel requests are latched rather than sent.
    pub fn defers_requests(&self) -> bool {
        *self == ValidatorState::Initializing || self.is_power_up()
    }
}

impl fmt::Display for ValidatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
