//! Batch run results and summary statistics.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use stockpile_core::{RunId, StockRecord};

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: RunId,
    /// Successfully assembled records, keyed by symbol.
    pub records: HashMap<String, StockRecord>,
    /// Symbols that failed permanently: retryable failures that were
    /// dropped from a full queue or still failing when rounds ran out.
    pub failed: HashSet<String>,
    pub stats: BatchStats,
}

/// Summary counters for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Symbols that produced a record.
    pub processed: usize,
    /// Symbols that failed permanently.
    pub failed: usize,
    /// Symbols rejected by a full retry queue (a subset of `failed`).
    pub dropped: usize,
    /// Dispatch rounds executed, the initial round included.
    pub rounds: u32,
}

impl BatchStats {
    /// Fraction of attempted symbols that produced a record.
    ///
    /// An empty run has no attempts and reports `0.0` rather than
    /// dividing by zero.
    pub fn success_rate(&self) -> f64 {
        let total = self.processed + self.failed;
        if total == 0 {
            0.0
        } else {
            self.processed as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_counts_both_outcomes() {
        let stats = BatchStats {
            processed: 3,
            failed: 1,
            dropped: 0,
            rounds: 2,
        };
        assert_eq!(stats.success_rate(), 0.75);
    }

    #[test]
    fn test_success_rate_zero_guard() {
        let stats = BatchStats {
            processed: 0,
            failed: 0,
            dropped: 0,
            rounds: 0,
        };
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_all_failed_is_zero_rate() {
        let stats = BatchStats {
            processed: 0,
            failed: 4,
            dropped: 2,
            rounds: 4,
        };
        assert_eq!(stats.success_rate(), 0.0);
    }
}
