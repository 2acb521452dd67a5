//! Property-based tests for the frame codec.
//!
//! Two invariants hold for every valid frame:
//! - decode is the exact inverse of encode, and
//! - flipping any single bit outside the checksum field makes decode fail
//!   with a framing error.

use proptest::prelude::*;

use egm_core::constants::MAX_PAYLOAD_LENGTH;
use egm_protocol::{FrameSchema, PRINTER_SCHEMA, VALIDATOR_SCHEMA};

/// Strategy for arbitrary command bytes and payloads within length limits.
fn command_and_payload() -> impl Strategy<Value = (u8, Vec<u8>)> {
    (
        any::<u8>(),
        prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LENGTH),
    )
}

fn schemas() -> impl Strategy<Value = FrameSchema> {
    prop_oneof![Just(VALIDATOR_SCHEMA), Just(PRINTER_SCHEMA)]
}

proptest! {
    /// Property: Decode(Encode(command, payload)) == (command, payload)
    /// for every command byte and every payload within length limits,
    /// under both protocol schemas.
    #[test]
    fn prop_encode_decode_roundtrip(
        schema in schemas(),
        (command, payload) in command_and_payload(),
    ) {
        let frame = schema.encode(command, &payload).unwrap();
        let (decoded_command, decoded_payload) = schema.decode(&frame).unwrap();

        prop_assert_eq!(decoded_command, command);
        prop_assert_eq!(decoded_payload, payload);
    }

    /// Property: any single-bit corruption outside the trailing checksum
    /// bytes is detected as a framing error.
    #[test]
    fn prop_single_bit_flip_is_detected(
        schema in schemas(),
        (command, payload) in command_and_payload(),
        flip in any::<proptest::sample::Index>(),
    ) {
        let frame = schema.encode(command, &payload).unwrap();
        let mut corrupted = frame.to_vec();

        // Pick a bit anywhere before the two checksum bytes.
        let bit_count = (corrupted.len() - 2) * 8;
        let bit = flip.index(bit_count);
        corrupted[bit / 8] ^= 1u8 << (bit % 8);

        let err = schema.decode(&corrupted).unwrap_err();
        prop_assert!(err.is_framing(), "expected framing error, got {err}");
    }

    /// Property: truncating an encoded frame never yields a successful
    /// decode.
    #[test]
    fn prop_truncation_is_detected(
        (command, payload) in command_and_payload(),
        cut in any::<proptest::sample::Index>(),
    ) {
        let frame = VALIDATOR_SCHEMA.encode(command, &payload).unwrap();
        let keep = cut.index(frame.len()); // strictly shorter than the frame
        prop_assert!(VALIDATOR_SCHEMA.decode(&frame[..keep]).is_err());
    }
}
