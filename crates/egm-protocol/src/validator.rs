//! Command and status vocabulary for the note-acceptor protocol.
//!
//! Command bytes (controller → device) and status bytes (device →
//! controller) occupy overlapping numeric ranges; direction disambiguates
//! them, which is why they are two separate enums over the same wire
//! field. Unrecognized status values map to [`ValidatorStatus::Unknown`]
//! rather than failing decode, so the polling loop can log and keep going.

use std::fmt;

use serde::Serialize;

/// Commands the controller sends to a note acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorCommand {
    /// Poll for the current device status.
    StatusRequest,
    /// Software reset.
    Reset,
    /// Stack the escrowed note into the cashbox.
    Stack,
    /// Return the escrowed note to the patron.
    Return,
    /// Keep the escrowed note held another poll cycle.
    Hold,
    /// Acknowledge a vend-valid report.
    Ack,
    /// Firmware version query.
    VersionRequest,
    /// Boot-block version query.
    BootVersionRequest,
    /// Currency-assignment table query.
    CurrencyAssignRequest,
    /// Set the per-denomination inhibit mask.
    InhibitSet,
    /// Set the per-denomination security mask.
    SecuritySet,
    /// Select the communication mode.
    CommunicationModeSet,
    /// Enable or disable barcode ticket acceptance.
    BarcodeSet,
    /// Set the barcode-inhibit mask.
    BarInhibitSet,
}

impl ValidatorCommand {
    pub fn as_u8(self) -> u8 {
        match self {
            ValidatorCommand::StatusRequest => 0x11,
            ValidatorCommand::Reset => 0x40,
            ValidatorCommand::Stack => 0x41,
            ValidatorCommand::Return => 0x43,
            ValidatorCommand::Hold => 0x44,
            ValidatorCommand::Ack => 0x50,
            ValidatorCommand::VersionRequest => 0x88,
            ValidatorCommand::BootVersionRequest => 0x89,
            ValidatorCommand::CurrencyAssignRequest => 0x8A,
            ValidatorCommand::SecuritySet => 0xC1,
            ValidatorCommand::CommunicationModeSet => 0xC2,
            ValidatorCommand::InhibitSet => 0xC3,
            ValidatorCommand::BarcodeSet => 0xC6,
            ValidatorCommand::BarInhibitSet => 0xC7,
        }
    }

    /// Informational queries are retried a bounded number of times;
    /// everything else is sent exactly once.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            ValidatorCommand::VersionRequest
                | ValidatorCommand::BootVersionRequest
                | ValidatorCommand::CurrencyAssignRequest
        )
    }
}

impl fmt::Display for ValidatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Status bytes a note acceptor reports.
///
/// Split into a *state* subset (drives the device state machine, edge
/// triggered), a *power-up* family (reported only at link
/// re-establishment), and an *error* subset (routed to the fault
/// aggregator, never a state transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    // State subset
    Idling,
    Accepting,
    Escrow,
    Stacking,
    VendValid,
    Stacked,
    Rejecting,
    Returning,
    Holding,
    Inhibit,
    Initializing,

    // Power-up family
    PowerUp,
    PowerUpBillInAcceptor,
    PowerUpBillInStacker,

    // Error subset
    StackerFull,
    StackerOpen,
    JamInAcceptor,
    JamInStacker,
    Pause,
    Cheated,
    Failure,
    CommunicationError,

    /// Echo of an acknowledged command.
    Ack,

    /// A well-framed status byte outside the known vocabulary. Logged and
    /// ignored; never an error.
    Unknown(u8),
}

impl ValidatorStatus {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x11 => ValidatorStatus::Idling,
            0x12 => ValidatorStatus::Accepting,
            0x13 => ValidatorStatus::Escrow,
            0x14 => ValidatorStatus::Stacking,
            0x15 => ValidatorStatus::VendValid,
            0x16 => ValidatorStatus::Stacked,
            0x17 => ValidatorStatus::Rejecting,
            0x18 => ValidatorStatus::Returning,
            0x19 => ValidatorStatus::Holding,
            0x1A => ValidatorStatus::Inhibit,
            0x1B => ValidatorStatus::Initializing,
            0x40 => ValidatorStatus::PowerUp,
            0x41 => ValidatorStatus::PowerUpBillInAcceptor,
            0x42 => ValidatorStatus::PowerUpBillInStacker,
            0x43 => ValidatorStatus::StackerFull,
            0x44 => ValidatorStatus::StackerOpen,
            0x45 => ValidatorStatus::JamInAcceptor,
            0x46 => ValidatorStatus::JamInStacker,
            0x47 => ValidatorStatus::Pause,
            0x48 => ValidatorStatus::Cheated,
            0x49 => ValidatorStatus::Failure,
            0x4A => ValidatorStatus::CommunicationError,
            0x50 => ValidatorStatus::Ack,
            other => ValidatorStatus::Unknown(other),
        }
    }

    /// Whether this status belongs to the error subset.
    pub fn is_error_subset(self) -> bool {
        matches!(
            self,
            ValidatorStatus::StackerFull
                | ValidatorStatus::StackerOpen
                | ValidatorStatus::JamInAcceptor
                | ValidatorStatus::JamInStacker
                | ValidatorStatus::Pause
                | ValidatorStatus::Cheated
                | ValidatorStatus::Failure
                | ValidatorStatus::CommunicationError
        )
    }

    /// Whether this status belongs to the state subset (power-up family
    /// included: those are states entered at link re-establishment).
    pub fn is_state_subset(self) -> bool {
        !self.is_error_subset() && !matches!(self, ValidatorStatus::Ack | ValidatorStatus::Unknown(_))
    }
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
