//! Report vocabulary for the ticket-printer protocol.
//!
//! Printer traffic is organized as report frames: a report id plus a
//! payload whose encoding depends on the report type (raw flag bytes for
//! status, ASCII/UTF-8 text for region, template and print definitions).
//! Definitions larger than one frame are carried as multi-part payloads
//! with an `[index][total]` prefix; [`chunk_report_payload`] produces the
//! parts and [`reassemble_report_payload`] is its inverse.

use std::fmt;

use serde::Serialize;

use egm_core::constants::MAX_PAYLOAD_LENGTH;
use egm_core::{Error, Result};

/// Space left for definition data once the multi-part prefix is in place.
pub const CHUNK_DATA_LENGTH: usize = MAX_PAYLOAD_LENGTH - 2;

/// Report identifiers for printer frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterReport {
    /// Poll for printer status flags.
    StatusRequest,
    /// Status flag report (device → controller).
    StatusReport,
    /// Cache a print region definition.
    DefineRegion,
    /// Cache a template (an ordered list of region references).
    DefineTemplate,
    /// Render a ticket through a cached template.
    PrintTicket,
    /// Advance paper to top-of-form.
    FormFeed,
    /// Firmware identity query.
    FirmwareQuery,
    /// Firmware identity report (device → controller).
    FirmwareReport,
    /// Positive acknowledgement.
    Ack,
    /// Negative acknowledgement.
    Nack,
    /// A well-framed report id outside the known vocabulary.
    Unknown(u8),
}

impl PrinterReport {
    pub fn as_u8(self) -> u8 {
        match self {
            PrinterReport::StatusRequest => 0x20,
            PrinterReport::StatusReport => 0x21,
            PrinterReport::DefineRegion => 0x31,
            PrinterReport::DefineTemplate => 0x32,
            PrinterReport::PrintTicket => 0x33,
            PrinterReport::FormFeed => 0x34,
            PrinterReport::FirmwareQuery => 0x35,
            PrinterReport::FirmwareReport => 0x36,
            PrinterReport::Ack => 0x40,
            PrinterReport::Nack => 0x41,
            PrinterReport::Unknown(b) => b,
        }
    }

    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x20 => PrinterReport::StatusRequest,
            0x21 => PrinterReport::StatusReport,
            0x31 => PrinterReport::DefineRegion,
            0x32 => PrinterReport::DefineTemplate,
            0x33 => PrinterReport::PrintTicket,
            0x34 => PrinterReport::FormFeed,
            0x35 => PrinterReport::FirmwareQuery,
            0x36 => PrinterReport::FirmwareReport,
            0x40 => PrinterReport::Ack,
            0x41 => PrinterReport::Nack,
            other => PrinterReport::Unknown(other),
        }
    }
}

impl fmt::Display for PrinterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Split a definition payload into multi-part chunks.
///
/// Each part starts with `[index][total]` (both one-based is a common
/// trap; these are zero-based index and one-based total, matching how the
/// device counts). Payloads that fit one frame still carry the prefix so
/// the receiver has a single parse path.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] when the data would need more than
/// 255 parts.
pub fn chunk_report_payload(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let part_count = data.len().div_ceil(CHUNK_DATA_LENGTH).max(1);
    if part_count > 255 {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            max_size: CHUNK_DATA_LENGTH * 255,
        });
    }

    let mut parts = Vec::with_capacity(part_count);
    if data.is_empty() {
        parts.push(vec![0, 1]);
        return Ok(parts);
    }
    for (index, chunk) in data.chunks(CHUNK_DATA_LENGTH).enumerate() {
        let mut part = Vec::with_capacity(2 + chunk.len());
        part.push(index as u8);
        part.push(part_count as u8);
        part.extend_from_slice(chunk);
        parts.push(part);
    }
    Ok(parts)
}

/// Reassemble multi-part payloads produced by [`chunk_report_payload`].
///
/// # Errors
///
/// Returns [`Error::ProtocolViolation`] when a part is missing its
/// prefix, the totals disagree, or parts arrive out of order.
pub fn reassemble_report_payload(parts: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let expected_total = parts.len();

    for (position, part) in parts.iter().enumerate() {
        let [index, total, rest @ ..] = part.as_slice() else {
            return Err(Error::protocol("multi-part payload missing index prefix"));
        };
        if usize::from(*total) != expected_total {
            return Err(Error::protocol(format!(
                "multi-part total {total} disagrees with {expected_total} received parts"
            )));
        }
        if usize::from(*index) != position {
            return Err(Error::protocol(format!(
                "multi-part index {index} out of order at position {position}"
            )));
        }
        data.extend_from_slice(rest);
    }

    Ok(data)
}
