//! Active-fault tracking with supersession rules.
//!
//! Peripherals report faults one status byte at a time, and some reports
//! implicitly retract earlier ones: hardware that says its stacker is full
//! can no longer be saying the stacker door is open, because the sensor
//! path that produced the newer report supersedes the older. The
//! aggregator keeps the currently-active fault codes as an explicit
//! newest-first list with a per-code supersession table, rather than a
//! generic stack whose iteration order would be an accident.
//!
//! A report is produced only when the active set actually changes: raising
//! a fault that is already active is silent, and a clear event collapses
//! any number of active faults into one consolidated no-fault report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A device-class fault vocabulary usable by the aggregator.
pub trait FaultCode: Copy + Eq + fmt::Debug {
    /// Older faults this code implicitly resolves when it is raised.
    fn supersedes(&self) -> &'static [Self]
    where
        Self: Sized;
}

/// Consolidated snapshot of the active faults at one point in time.
///
/// `active` is ordered newest-first. An empty list is the "no fault"
/// report produced by a clear event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultReport<F> {
    pub active: Vec<F>,
    pub timestamp: DateTime<Utc>,
}

impl<F: Copy> FaultReport<F> {
    fn new(active: &[F]) -> Self {
        Self {
            active: active.to_vec(),
            timestamp: Utc::now(),
        }
    }

    /// Whether this is the consolidated all-clear report.
    pub fn is_clear(&self) -> bool {
        self.active.is_empty()
    }
}

/// Tracks the currently-active fault codes for one device.
///
/// Owned by the device's engine loop for the device's lifetime; no other
/// writer exists.
#[derive(Debug, Default)]
pub struct FaultAggregator<F: FaultCode> {
    /// Active faults, newest first.
    active: Vec<F>,
}

impl<F: FaultCode + 'static> FaultAggregator<F> {
    pub fn new() -> Self {
        Self { active: Vec::new() }
    }

    /// Currently-active fault codes, newest first.
    pub fn active(&self) -> &[F] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, fault: F) -> bool {
        self.active.contains(&fault)
    }

    /// Record a detected fault.
    ///
    /// Removes every active fault the new code supersedes (preserving the
    /// order of the remainder), then pushes the code if it is not already
    /// present. Returns a report only when the fault is newly raised;
    /// re-detection of an already-active fault is silent.
    pub fn raise(&mut self, fault: F) -> Option<FaultReport<F>> {
        self.active.retain(|f| !fault.supersedes().contains(f));

        if self.active.contains(&fault) {
            return None;
        }
        self.active.insert(0, fault);
        Some(FaultReport::new(&self.active))
    }

    /// Record a clear event: the device reported a no-fault status.
    ///
    /// Empties the list and returns one consolidated no-fault report, or
    /// `None` when nothing was active.
    pub fn clear(&mut self) -> Option<FaultReport<F>> {
        if self.active.is_empty() {
            return None;
        }
        self.active.clear();
        Some(FaultReport::new(&self.active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    enum TestFault {
        Open,
        Full,
        Jam,
    }

    impl FaultCode for TestFault {
        fn supersedes(&self) -> &'static [Self] {
            match self {
                TestFault::Full => &[TestFault::Open],
                _ => &[],
            }
        }
    }

    #[test]
    fn raise_reports_newest_first() {
        let mut agg = FaultAggregator::new();
        agg.raise(TestFault::Open).unwrap();
        let report = agg.raise(TestFault::Jam).unwrap();
        assert_eq!(report.active, vec![TestFault::Jam, TestFault::Open]);
    }

    #[test]
    fn duplicate_raise_is_silent() {
        let mut agg = FaultAggregator::new();
        assert!(agg.raise(TestFault::Jam).is_some());
        assert!(agg.raise(TestFault::Jam).is_none());
        assert_eq!(agg.active(), &[TestFault::Jam]);
    }

    #[test]
    fn supersession_removes_older_fault() {
        let mut agg = FaultAggregator::new();
        agg.raise(TestFault::Open).unwrap();
        let report = agg.raise(TestFault::Full).unwrap();

        assert!(report.active.contains(&TestFault::Full));
        assert!(!report.active.contains(&TestFault::Open));
        assert!(!agg.contains(TestFault::Open));
    }

    #[test]
    fn supersession_preserves_unrelated_order() {
        let mut agg = FaultAggregator::new();
        agg.raise(TestFault::Jam).unwrap();
        agg.raise(TestFault::Open).unwrap();
        let report = agg.raise(TestFault::Full).unwrap();
        assert_eq!(report.active, vec![TestFault::Full, TestFault::Jam]);
    }

    #[test]
    fn clear_consolidates_to_single_report() {
        let mut agg = FaultAggregator::new();
        agg.raise(TestFault::Open).unwrap();
        agg.raise(TestFault::Jam).unwrap();

        let report = agg.clear().unwrap();
        assert!(report.is_clear());
        assert!(agg.is_empty());

        // A second clear with nothing active produces nothing.
        assert!(agg.clear().is_none());
    }
}
