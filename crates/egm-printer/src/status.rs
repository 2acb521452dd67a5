//! Printer status flags, states and fault vocabulary.
//!
//! A status report carries two flag bytes: one for fault conditions, one
//! for operating state. Flags are levels, not edges; the engine compares
//! consecutive reports and acts on changes.
//!
//! ```text
//! byte 0 (faults)            byte 1 (state)
//! bit 0  chassis open        bit 0  enabled
//! bit 1  paper jam           bit 1  at top-of-form
//! bit 2  print head open     bit 2  print in progress
//! bit 3  paper out           bit 3  last ticket incomplete
//! bit 4  paper low
//! bit 5  head overheat
//! ```

use std::fmt;

use serde::Serialize;

use egm_core::faults::FaultCode;
use egm_core::{Error, Result};

/// Decoded printer status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrinterStatus {
    pub chassis_open: bool,
    pub paper_jam: bool,
    pub head_open: bool,
    pub paper_out: bool,
    pub paper_low: bool,
    pub head_overheat: bool,
    pub enabled: bool,
    pub top_of_form: bool,
    pub print_in_progress: bool,
    pub last_ticket_incomplete: bool,
}

impl PrinterStatus {
    /// Decode the two flag bytes of a status report payload.
    pub fn from_report(payload: &[u8]) -> Result<Self> {
        let [faults, state, ..] = payload else {
            return Err(Error::protocol(format!(
                "status report payload of {} bytes, expected 2",
                payload.len()
            )));
        };
        Ok(Self {
            chassis_open: faults & 0x01 != 0,
            paper_jam: faults & 0x02 != 0,
            head_open: faults & 0x04 != 0,
            paper_out: faults & 0x08 != 0,
            paper_low: faults & 0x10 != 0,
            head_overheat: faults & 0x20 != 0,
            enabled: state & 0x01 != 0,
            top_of_form: state & 0x02 != 0,
            print_in_progress: state & 0x04 != 0,
            last_ticket_incomplete: state & 0x08 != 0,
        })
    }

    /// Encode back into the two flag bytes (mock devices, tests).
    pub fn to_report(&self) -> [u8; 2] {
        let mut faults = 0u8;
        let mut state = 0u8;
        for (bit, set) in [
            (0x01, self.chassis_open),
            (0x02, self.paper_jam),
            (0x04, self.head_open),
            (0x08, self.paper_out),
            (0x10, self.paper_low),
            (0x20, self.head_overheat),
        ] {
            if set {
                faults |= bit;
            }
        }
        for (bit, set) in [
            (0x01, self.enabled),
            (0x02, self.top_of_form),
            (0x04, self.print_in_progress),
            (0x08, self.last_ticket_incomplete),
        ] {
            if set {
                state |= bit;
            }
        }
        [faults, state]
    }

    /// Whether a fault that forbids printing is active: chassis open,
    /// paper jam or print head open.
    pub fn has_disabling_fault(&self) -> bool {
        self.chassis_open || self.paper_jam || self.head_open
    }

    /// Whether a print attempt may proceed at all.
    pub fn can_print(&self) -> bool {
        !self.has_disabling_fault() && self.enabled && self.top_of_form
    }

    /// Fault codes currently flagged, most severe first.
    pub fn active_faults(&self) -> Vec<PrinterFault> {
        let mut faults = Vec::new();
        for (set, fault) in [
            (self.chassis_open, PrinterFault::ChassisOpen),
            (self.paper_jam, PrinterFault::PaperJam),
            (self.head_open, PrinterFault::HeadOpen),
            (self.paper_out, PrinterFault::PaperOut),
            (self.paper_low, PrinterFault::PaperLow),
            (self.head_overheat, PrinterFault::HeadOverheat),
        ] {
            if set {
                faults.push(fault);
            }
        }
        faults
    }
}

/// Hardware faults a printer reports through its status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterFault {
    ChassisOpen,
    PaperJam,
    HeadOpen,
    PaperOut,
    PaperLow,
    HeadOverheat,
}

impl FaultCode for PrinterFault {
    /// An empty paper path cannot still be reporting "low".
    fn supersedes(&self) -> &'static [Self] {
        match self {
            PrinterFault::PaperOut => &[PrinterFault::PaperLow],
            _ => &[],
        }
    }
}

impl fmt::Display for PrinterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Semantic state of the printer engine.
///
/// Definitions must be cached before printing; completion of a ticket is
/// observed through polled status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterState {
    /// Template cache is empty; nothing can print yet.
    AwaitingDefinitions,
    /// At least one template is cached and no ticket is in flight.
    Ready,
    /// A ticket is being rendered.
    PrintInProgress,
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn report_roundtrip() {
        let status = PrinterStatus {
            paper_jam: true,
            paper_low: true,
            enabled: true,
            top_of_form: true,
            ..PrinterStatus::default()
        };
        let report = status.to_report();
        assert_eq!(PrinterStatus::from_report(&report).unwrap(), status);
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(PrinterStatus::from_report(&[0x01]).is_err());
        assert!(PrinterStatus::from_report(&[]).is_err());
    }

    #[rstest]
    #[case(PrinterStatus { chassis_open: true, enabled: true, top_of_form: true, ..PrinterStatus::default() })]
    #[case(PrinterStatus { paper_jam: true, enabled: true, top_of_form: true, ..PrinterStatus::default() })]
    #[case(PrinterStatus { head_open: true, enabled: true, top_of_form: true, ..PrinterStatus::default() })]
    fn disabling_faults_forbid_printing(#[case] status: PrinterStatus) {
        assert!(status.has_disabling_fault());
        assert!(!status.can_print());
    }

    #[test]
    fn paper_low_alone_does_not_forbid_printing() {
        let status = PrinterStatus {
            paper_low: true,
            enabled: true,
            top_of_form: true,
            ..PrinterStatus::default()
        };
        assert!(!status.has_disabling_fault());
        assert!(status.can_print());
    }

    #[test]
    fn printing_needs_enable_and_top_of_form() {
        let mut status = PrinterStatus {
            enabled: true,
            top_of_form: false,
            ..PrinterStatus::default()
        };
        assert!(!status.can_print());

        status.top_of_form = true;
        assert!(status.can_print());

        status.enabled = false;
        assert!(!status.can_print());
    }

    #[test]
    fn active_fault_listing() {
        let status = PrinterStatus {
            paper_out: true,
            head_overheat: true,
            ..PrinterStatus::default()
        };
        assert_eq!(
            status.active_faults(),
            vec![PrinterFault::PaperOut, PrinterFault::HeadOverheat]
        );
    }
}
