//! Protocol and timing constants for the peripheral communication layer.
//!
//! Wire constants describe the framed serial protocols spoken by the note
//! acceptor and the ticket printer; timing constants are the defaults for
//! the polling cadence and response windows. All timings are overridable
//! per device through the session/engine configuration types.
//!
//! # Note-acceptor framing
//!
//! ```text
//! [Sync=0xFC] [Length:1] [Cmd/Status:1] [Data:0..N] [CRC lo] [CRC hi]
//!  ^^^^^^^^^   ^^^^^^^^                              ^^^^^^^^^^^^^^^^
//!  constant    whole-frame byte count                CCITT-Kermit, seed 0,
//!                                                    over every prior byte
//! ```
//!
//! Command bytes and status bytes occupy overlapping numeric ranges and
//! are disambiguated by direction (controller→device vs device→controller).
//!
//! # Printer framing
//!
//! ```text
//! [Sync=0x7E] [Length:1] [ReportId:1] [Data:0..N] [CRC lo] [CRC hi]
//! ```
//!
//! Printer report payloads that span multiple frames carry an
//! `[index][total]` prefix inside Data.

// ============================================================================
// Wire format
// ============================================================================

/// Sync byte opening every note-acceptor frame.
pub const VALIDATOR_SYNC: u8 = 0xFC;

/// Sync byte opening every printer report frame.
pub const PRINTER_SYNC: u8 = 0x7E;

/// Bytes of framing around the payload: sync + length + command + 2 CRC.
pub const FRAME_OVERHEAD: usize = 5;

/// Largest frame the one-byte length field can declare.
pub const MAX_FRAME_LENGTH: usize = 255;

/// Largest payload that fits a single frame.
pub const MAX_PAYLOAD_LENGTH: usize = MAX_FRAME_LENGTH - FRAME_OVERHEAD;

// ============================================================================
// Timing defaults
// ============================================================================

/// Idle polling cadence for the note acceptor (milliseconds).
///
/// The heartbeat that surfaces asynchronous hardware state changes; a
/// status request is issued at this interval whenever no explicit command
/// is pending.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;

/// Response window during normal operation (milliseconds).
pub const DEFAULT_COMMUNICATION_TIMEOUT_MS: u64 = 500;

/// Response window during device bring-up (milliseconds).
///
/// Devices routinely take much longer to answer the first exchanges after
/// power-up, so initialization runs against a separate, longer window.
pub const DEFAULT_INITIALIZATION_TIMEOUT_MS: u64 = 5_000;

/// Floor on plausible response arrival (milliseconds).
///
/// A multi-byte serial reply cannot complete faster than the line can
/// carry it; anything quicker is a stale or duplicated frame left over
/// from an earlier exchange and is discarded.
pub const DEFAULT_MINIMUM_RESPONSE_TIME_MS: u64 = 5;

/// How long a note may sit in escrow without a host decision (milliseconds).
///
/// When exceeded, the engine returns the note itself on the next poll
/// tick. A validator must never hold currency indefinitely.
pub const DEFAULT_ESCROW_TIMEOUT_MS: u64 = 10_000;

/// Attempts allowed for informational queries (version, boot info,
/// currency table) before the query is treated as failed.
pub const INFO_QUERY_ATTEMPTS: u32 = 3;

/// Consecutive poll timeouts before a communication-error fault is raised.
pub const COMM_ERROR_THRESHOLD: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_limit_accounts_for_overhead() {
        assert_eq!(MAX_PAYLOAD_LENGTH + FRAME_OVERHEAD, MAX_FRAME_LENGTH);
    }

    #[test]
    fn sync_bytes_differ_per_protocol() {
        assert_ne!(VALIDATOR_SYNC, PRINTER_SYNC);
    }
}
