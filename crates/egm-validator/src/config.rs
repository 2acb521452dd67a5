//! Note-acceptor engine configuration.

use std::collections::HashMap;
use std::time::Duration;

use egm_core::CurrencyCode;
use egm_core::constants::{DEFAULT_ESCROW_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};
use egm_session::SessionTiming;

/// Everything the platform decides about one note acceptor.
///
/// The masks go to the device verbatim during the configuration sequence;
/// the currency map assigns ISO currencies to the device's one-byte
/// country codes when the note table is built.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Idle polling cadence.
    pub poll_interval: Duration,
    /// How long a note may wait in escrow for a host decision.
    pub escrow_timeout: Duration,
    /// Response windows for the transport session.
    pub timing: SessionTiming,
    /// Denomination inhibit mask sent while acceptance is enabled
    /// (bit set = denomination refused).
    pub denomination_inhibit_mask: u8,
    /// Per-denomination security (strict validation) mask.
    pub security_mask: u8,
    /// Communication mode selector (0 = polled).
    pub communication_mode: u8,
    /// Whether barcode tickets are accepted.
    pub barcode_enabled: bool,
    /// Barcode-type inhibit mask.
    pub bar_inhibit_mask: u8,
    /// Device country code to ISO currency assignment.
    pub currency_map: HashMap<u8, CurrencyCode>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            escrow_timeout: Duration::from_millis(DEFAULT_ESCROW_TIMEOUT_MS),
            timing: SessionTiming::default(),
            denomination_inhibit_mask: 0x00,
            security_mask: 0x00,
            communication_mode: 0x00,
            barcode_enabled: false,
            bar_inhibit_mask: 0xFF,
            currency_map: default_currency_map(),
        }
    }
}

/// Country-code assignments used when the platform provides none.
fn default_currency_map() -> HashMap<u8, CurrencyCode> {
    HashMap::from([
        (0x01, CurrencyCode::new("USD").expect("static code")),
        (0x02, CurrencyCode::new("EUR").expect("static code")),
        (0x03, CurrencyCode::new("GBP").expect("static code")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ValidatorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(150));
        assert_eq!(config.escrow_timeout, Duration::from_secs(10));
        assert!(config.currency_map.contains_key(&0x01));
    }
}
