//! Declarative frame schema: typed field layout evaluated by one
//! encoder/decoder pair.
//!
//! A frame is an ordered sequence of typed elements. Instead of scattering
//! byte offsets through the codebase (or deriving them from runtime
//! metadata), each protocol declares its layout once as a const field
//! list, and `encode`/`decode` walk that list. The two are exact inverses
//! for every valid `(command, payload)` pair.
//!
//! # Layouts
//!
//! Note acceptor:
//!
//! ```text
//! [Sync=0xFC] [Length:1] [Cmd/Status:1] [Data:0..N] [CRC lo] [CRC hi]
//! ```
//!
//! Printer:
//!
//! ```text
//! [Sync=0x7E] [Length:1] [ReportId:1] [Data:0..N] [CRC lo] [CRC hi]
//! ```
//!
//! The length byte counts the whole frame, sync and CRC included. The CRC
//! covers every byte that precedes it, in field order, and never itself.
//!
//! # Example
//!
//! ```
//! use egm_protocol::VALIDATOR_SCHEMA;
//!
//! let frame = VALIDATOR_SCHEMA.encode(0x11, &[]).unwrap();
//! let (command, payload) = VALIDATOR_SCHEMA.decode(&frame).unwrap();
//! assert_eq!(command, 0x11);
//! assert!(payload.is_empty());
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use egm_core::constants::{
    FRAME_OVERHEAD, MAX_PAYLOAD_LENGTH, PRINTER_SYNC, VALIDATOR_SYNC,
};
use egm_core::{Error, Result};

use crate::checksum::Crc16;

/// One typed element of a frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A constant byte (preamble/sync).
    Sync(u8),
    /// One byte holding the total encoded frame length.
    FullLength,
    /// The command/status/report identifier byte.
    Command,
    /// Variable-length payload; its size is the frame length minus the
    /// fixed overhead.
    Payload,
    /// Trailing 16-bit checksum, little-endian, over all prior bytes.
    Checksum,
}

/// A protocol's frame layout plus its checksum engine.
#[derive(Debug, Clone, Copy)]
pub struct FrameSchema {
    pub fields: &'static [FieldKind],
    pub crc: Crc16,
}

/// Note-acceptor frame layout (CCITT-Kermit CRC).
pub const VALIDATOR_SCHEMA: FrameSchema = FrameSchema {
    fields: &[
        FieldKind::Sync(VALIDATOR_SYNC),
        FieldKind::FullLength,
        FieldKind::Command,
        FieldKind::Payload,
        FieldKind::Checksum,
    ],
    crc: Crc16::KERMIT,
};

/// Printer report frame layout (ARC CRC).
pub const PRINTER_SCHEMA: FrameSchema = FrameSchema {
    fields: &[
        FieldKind::Sync(PRINTER_SYNC),
        FieldKind::FullLength,
        FieldKind::Command,
        FieldKind::Payload,
        FieldKind::Checksum,
    ],
    crc: Crc16::ARC,
};

impl FrameSchema {
    /// The constant byte that opens frames of this schema.
    pub fn sync_byte(&self) -> u8 {
        match self.fields.first() {
            Some(FieldKind::Sync(b)) => *b,
            _ => unreachable!("schemas open with a sync field"),
        }
    }

    /// Encode a command and payload into a complete wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] when the payload cannot fit the
    /// one-byte length field.
    pub fn encode(&self, command: u8, payload: &[u8]) -> Result<Bytes> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max_size: MAX_PAYLOAD_LENGTH,
            });
        }

        let total = FRAME_OVERHEAD + payload.len();
        let mut buf = BytesMut::with_capacity(total);

        for field in self.fields {
            match field {
                FieldKind::Sync(b) => buf.put_u8(*b),
                FieldKind::FullLength => buf.put_u8(total as u8),
                FieldKind::Command => buf.put_u8(command),
                FieldKind::Payload => buf.put_slice(payload),
                FieldKind::Checksum => {
                    let crc = self.crc.compute(&buf);
                    buf.put_u16_le(crc);
                }
            }
        }

        Ok(buf.freeze())
    }

    /// Decode a complete wire frame back into `(command, payload)`.
    ///
    /// Unrecognized command/status values are NOT a decode failure; the
    /// raw byte is returned and the vocabulary enums map it to an Unknown
    /// sentinel so pollers can log and continue.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooShort`]: fewer bytes than the fixed overhead
    /// - [`Error::SyncMismatch`]: preamble byte differs
    /// - [`Error::LengthMismatch`]: declared length differs from the
    ///   received byte count
    /// - [`Error::ChecksumMismatch`]: trailing CRC disagrees
    pub fn decode(&self, frame: &[u8]) -> Result<(u8, Vec<u8>)> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(Error::FrameTooShort {
                length: frame.len(),
                minimum: FRAME_OVERHEAD,
            });
        }

        let mut cursor = 0usize;
        let mut command = 0u8;
        let mut payload = Vec::new();
        let body_end = frame.len() - 2;

        for field in self.fields {
            match field {
                FieldKind::Sync(expected) => {
                    let actual = frame[cursor];
                    if actual != *expected {
                        return Err(Error::SyncMismatch {
                            expected: *expected,
                            actual,
                        });
                    }
                    cursor += 1;
                }
                FieldKind::FullLength => {
                    let declared = frame[cursor] as usize;
                    if declared != frame.len() {
                        return Err(Error::LengthMismatch {
                            declared,
                            actual: frame.len(),
                        });
                    }
                    cursor += 1;
                }
                FieldKind::Command => {
                    command = frame[cursor];
                    cursor += 1;
                }
                FieldKind::Payload => {
                    payload = frame[cursor..body_end].to_vec();
                    cursor = body_end;
                }
                FieldKind::Checksum => {
                    let expected = self.crc.compute(&frame[..body_end]);
                    let actual = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
                    if expected != actual {
                        return Err(Error::ChecksumMismatch { expected, actual });
                    }
                    cursor += 2;
                }
            }
        }

        debug_assert_eq!(cursor, frame.len());
        Ok((command, payload))
    }
}
