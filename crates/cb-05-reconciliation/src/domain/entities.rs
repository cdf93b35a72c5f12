//! # Reconciliation Reports
//!
//! What each pass did. Reports are informational; callers log them and the
//! runtime turns them into metrics.

use shared_types::{Amount, Offset};
use std::collections::BTreeMap;

/// Outcome of a holdings-based pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HoldingsReport {
    /// Active holdings read from the ledger.
    pub holdings_scanned: usize,
    /// Holdings skipped because their amount did not parse.
    pub holdings_skipped: usize,
    /// Total supply per symbol. Empty when supply was not written.
    pub total_supply: BTreeMap<String, Amount>,
    /// Cached balances overwritten.
    pub balances_written: usize,
    /// Balance writes that failed and were skipped.
    pub balances_failed: usize,
}

/// Outcome of an event-sourced pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventsReport {
    /// Mint events read from the ledger.
    pub mint_events: usize,
    /// Burn events read from the ledger.
    pub burn_events: usize,
    /// Events stored by this pass.
    pub processed: usize,
    /// Events found in the processed set.
    pub already_processed: usize,
    /// Events that could not be decoded or stored.
    pub skipped: usize,
    /// Highest offset stored by this pass.
    pub last_offset: Option<Offset>,
}

impl EventsReport {
    /// Events read from the ledger.
    pub fn total(&self) -> usize {
        self.mint_events + self.burn_events
    }
}

/// Outcome of a full reset-and-rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FullReconcileReport {
    /// Symbols whose cached balances were zeroed.
    pub symbols_reset: Vec<String>,
    /// The replay that followed the reset.
    pub events: EventsReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_report_total() {
        let report = EventsReport {
            mint_events: 3,
            burn_events: 2,
            ..Default::default()
        };
        assert_eq!(report.total(), 5);
    }
}
