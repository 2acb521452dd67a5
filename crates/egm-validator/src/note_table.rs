//! Escrow-code to note-value mapping.
//!
//! The device identifies an escrowed note by a one-byte escrow code. What
//! that code is worth is platform policy: the currency-assignment query
//! returns `[escrow_code, country_code, base, exponent]` records, the
//! configured country map supplies the ISO currency, and the value is
//! `base * 10^exponent` minor units. The table is built once per
//! assignment query and rebuilt whenever the device reports a changed
//! currency set.

use std::collections::HashMap;

use tracing::warn;

use egm_core::{CurrencyCode, Error, NoteValue, Result};

/// Bytes per currency-assignment record.
const RECORD_LENGTH: usize = 4;

/// Largest accepted denomination exponent; anything above it is a
/// corrupt record, not a real banknote series.
const MAX_EXPONENT: u32 = 7;

/// Mapping from device escrow codes to platform note values.
#[derive(Debug, Default, Clone)]
pub struct NoteTable {
    entries: HashMap<u8, NoteValue>,
    /// Raw assignment payload, kept to detect a changed currency set.
    raw: Vec<u8>,
}

impl NoteTable {
    /// Build a table from a currency-assignment payload.
    ///
    /// Records whose country code is missing from the map or whose
    /// exponent is implausible are skipped with a warning; one bad
    /// record must not take down acceptance of the others.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] when the payload is not a
    /// whole number of records.
    pub fn from_assignment(
        payload: &[u8],
        currency_map: &HashMap<u8, CurrencyCode>,
    ) -> Result<Self> {
        if payload.len() % RECORD_LENGTH != 0 {
            return Err(Error::protocol(format!(
                "currency assignment payload of {} bytes is not a whole number of {}-byte records",
                payload.len(),
                RECORD_LENGTH
            )));
        }

        let mut entries = HashMap::new();
        for record in payload.chunks_exact(RECORD_LENGTH) {
            let [escrow_code, country_code, base, exponent] = record else {
                unreachable!("chunks_exact yields full records");
            };

            let Some(currency) = currency_map.get(country_code) else {
                warn!(country_code, escrow_code, "unmapped country code, skipping record");
                continue;
            };
            let exponent = u32::from(*exponent);
            if exponent > MAX_EXPONENT {
                warn!(escrow_code, exponent, "implausible denomination exponent, skipping record");
                continue;
            }

            let denomination = u32::from(*base) * 10u32.pow(exponent);
            entries.insert(*escrow_code, NoteValue::new(denomination, *currency));
        }

        Ok(Self {
            entries,
            raw: payload.to_vec(),
        })
    }

    /// Look up the platform value assigned to an escrow code.
    pub fn lookup(&self, escrow_code: u8) -> Option<NoteValue> {
        self.entries.get(&escrow_code).copied()
    }

    /// Whether a fresh assignment payload differs from the one this
    /// table was built from.
    pub fn differs_from(&self, payload: &[u8]) -> bool {
        self.raw != payload
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd_map() -> HashMap<u8, CurrencyCode> {
        HashMap::from([(0x01, CurrencyCode::new("USD").unwrap())])
    }

    #[test]
    fn assignment_builds_values() {
        // escrow 0x05 -> 20 * 10^2 = 2000 minor units.
        let table = NoteTable::from_assignment(&[0x05, 0x01, 20, 2], &usd_map()).unwrap();

        let value = table.lookup(0x05).unwrap();
        assert_eq!(value.denomination.as_minor_units(), 2000);
        assert_eq!(value.currency.as_str(), "USD");
        assert_eq!(table.lookup(0x06), None);
    }

    #[test]
    fn ragged_payload_is_rejected() {
        assert!(NoteTable::from_assignment(&[0x05, 0x01, 20], &usd_map()).is_err());
    }

    #[test]
    fn unmapped_country_is_skipped_not_fatal() {
        let payload = [0x05, 0x99, 20, 2, 0x06, 0x01, 50, 2];
        let table = NoteTable::from_assignment(&payload, &usd_map()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(0x05), None);
        assert_eq!(table.lookup(0x06).unwrap().denomination.as_minor_units(), 5000);
    }

    #[test]
    fn implausible_exponent_is_skipped() {
        let table = NoteTable::from_assignment(&[0x05, 0x01, 20, 200], &usd_map()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn change_detection() {
        let payload = [0x05, 0x01, 20, 2];
        let table = NoteTable::from_assignment(&payload, &usd_map()).unwrap();

        assert!(!table.differs_from(&payload));
        assert!(table.differs_from(&[0x05, 0x01, 50, 2]));
    }
}
