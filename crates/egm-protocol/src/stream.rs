//! Stateful byte-stream parser for framed serial protocols.
//!
//! A serial read returns whatever bytes happen to be in the UART buffer:
//! part of a frame, a whole frame, several frames back to back, or line
//! noise. The parser accumulates bytes and delimits complete frames using
//! a small state machine keyed on the protocol's sync byte and whole-frame
//! length field.
//!
//! ```text
//! ┌─────────────┐ sync byte  ┌───────────────┐ length byte ┌─────────────┐
//! │ WaitingSync │───────────>│ ReadingLength │────────────>│ ReadingBody │
//! └─────────────┘            └───────────────┘             └─────────────┘
//!       ^  │ other bytes            │ implausible length          │ frame
//!       │  │ (discarded)            │ (resync)                    │ complete
//!       │  └────<────────────<──────┴──────────<──────────────────┘
//! ```
//!
//! Complete frames are queued raw; checksum and length validation belong
//! to [`FrameSchema::decode`](crate::schema::FrameSchema::decode). No
//! partial frame is ever exposed.

use std::collections::VecDeque;

use bytes::Bytes;

use egm_core::constants::FRAME_OVERHEAD;

use crate::schema::FrameSchema;

/// Parser states while delimiting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Hunting for the sync byte; everything else is discarded.
    WaitingSync,
    /// Sync seen, next byte is the whole-frame length.
    ReadingLength,
    /// Accumulating until the declared length is reached.
    ReadingBody,
}

/// Accumulates serial bytes and yields complete raw frames.
#[derive(Debug)]
pub struct StreamParser {
    sync: u8,
    state: ParserState,
    frame: Vec<u8>,
    expected_len: usize,
    frames: VecDeque<Bytes>,
}

impl StreamParser {
    pub fn new(sync: u8) -> Self {
        Self {
            sync,
            state: ParserState::WaitingSync,
            frame: Vec::with_capacity(FRAME_OVERHEAD),
            expected_len: 0,
            frames: VecDeque::new(),
        }
    }

    /// Parser delimiting frames of the given schema.
    pub fn for_schema(schema: &FrameSchema) -> Self {
        Self::new(schema.sync_byte())
    }

    /// Feed bytes from the link; complete frames queue up for extraction.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.accept(b);
        }
    }

    /// Pop the next complete frame, oldest first.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    /// Current state of the delimiting state machine.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Whether a complete frame is waiting.
    pub fn has_frame(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Drop any partial frame and queued frames.
    ///
    /// Used when an exchange is abandoned (timeout, link close) so a late
    /// straggler cannot be mistaken for the next command's reply.
    pub fn reset(&mut self) {
        self.state = ParserState::WaitingSync;
        self.frame.clear();
        self.frames.clear();
    }

    fn accept(&mut self, byte: u8) {
        match self.state {
            ParserState::WaitingSync => {
                if byte == self.sync {
                    self.frame.clear();
                    self.frame.push(byte);
                    self.state = ParserState::ReadingLength;
                }
                // Anything before sync is noise.
            }
            ParserState::ReadingLength => {
                let declared = byte as usize;
                if declared < FRAME_OVERHEAD {
                    // A frame cannot be shorter than its own framing;
                    // treat the sync as spurious and resync.
                    self.state = ParserState::WaitingSync;
                    self.frame.clear();
                    return;
                }
                self.frame.push(byte);
                self.expected_len = declared;
                self.state = ParserState::ReadingBody;
            }
            ParserState::ReadingBody => {
                self.frame.push(byte);
                if self.frame.len() == self.expected_len {
                    self.frames
                        .push_back(Bytes::from(std::mem::take(&mut self.frame)));
                    self.state = ParserState::WaitingSync;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VALIDATOR_SCHEMA;

    fn encoded(command: u8, payload: &[u8]) -> Bytes {
        VALIDATOR_SCHEMA.encode(command, payload).unwrap()
    }

    #[test]
    fn single_feed_yields_frame() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x11, &[]);

        parser.feed(&frame);

        assert_eq!(parser.next_frame().unwrap(), frame);
        assert!(parser.next_frame().is_none());
    }

    #[test]
    fn frame_split_across_feeds() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x13, &[0x05]);

        parser.feed(&frame[..2]);
        assert!(!parser.has_frame());
        parser.feed(&frame[2..4]);
        assert!(!parser.has_frame());
        parser.feed(&frame[4..]);

        assert_eq!(parser.next_frame().unwrap(), frame);
    }

    #[test]
    fn byte_at_a_time() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x15, &[0x01, 0x02, 0x03]);

        for &b in frame.iter() {
            parser.feed(&[b]);
        }

        assert_eq!(parser.next_frame().unwrap(), frame);
    }

    #[test]
    fn garbage_before_sync_is_discarded() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x11, &[]);

        let mut noisy = vec![0x00, 0x7F, 0xFF];
        noisy.extend_from_slice(&frame);
        parser.feed(&noisy);

        assert_eq!(parser.next_frame().unwrap(), frame);
    }

    #[test]
    fn two_frames_in_one_feed() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let first = encoded(0x11, &[]);
        let second = encoded(0x13, &[0x05]);

        let mut both = first.to_vec();
        both.extend_from_slice(&second);
        parser.feed(&both);

        assert_eq!(parser.next_frame().unwrap(), first);
        assert_eq!(parser.next_frame().unwrap(), second);
    }

    #[test]
    fn implausible_length_resyncs() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x11, &[]);

        // Sync followed by a length smaller than the framing itself.
        parser.feed(&[0xFC, 0x02]);
        assert_eq!(parser.state(), ParserState::WaitingSync);

        parser.feed(&frame);
        assert_eq!(parser.next_frame().unwrap(), frame);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut parser = StreamParser::for_schema(&VALIDATOR_SCHEMA);
        let frame = encoded(0x13, &[0x05]);

        parser.feed(&frame[..3]);
        parser.reset();
        assert_eq!(parser.state(), ParserState::WaitingSync);

        // The tail of the abandoned frame is now noise; a fresh frame
        // still parses.
        parser.feed(&frame[3..]);
        assert!(parser.next_frame().is_none());
        parser.feed(&frame);
        assert_eq!(parser.next_frame().unwrap(), frame);
    }
}
