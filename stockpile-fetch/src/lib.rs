//! # Stockpile Fetch - Provider Clients and Admission Control
//!
//! Everything between the orchestrator and the wire lives here:
//!
//! - [`RateLimiter`]: blocking admission gate combining minimum spacing
//!   (with jitter) and a sliding-window request cap
//! - [`validate_response`]: shape and required-field checks applied to
//!   every payload before it is cached
//! - [`FmpClient`] / [`FmpRecordSource`]: the Financial Modeling Prep
//!   provider, assembling one canonical [`StockRecord`] per identifier
//!
//! The [`RecordSource`] trait is the seam the batch orchestrator drives;
//! [`ScriptedRecordSource`] implements it with canned outcomes for tests.

pub mod providers;
pub mod rate_limit;
pub mod validate;

pub use providers::fmp::{probe_auth, FmpClient, FmpRecordSource};
pub use rate_limit::RateLimiter;
pub use validate::validate_response;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use stockpile_core::{FetchError, StockRecord};

// ===== RECORD SOURCE TRAIT =====

/// Source of fully assembled stock records, one call per identifier.
///
/// Implementations own their transport, caching and admission concerns;
/// callers only see the final record or a [`FetchError`] classified by
/// the taxonomy in `stockpile-core`.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch and assemble the record for one ticker symbol.
    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError>;
}

// ===== SCRIPTED SOURCE (FOR TESTS) =====

/// Mock record source driven by per-symbol outcome scripts.
///
/// Each call pops the next scripted outcome for the symbol; once a script
/// is exhausted its last outcome repeats, so a one-entry script means
/// "always behaves like this". Symbols without a script resolve to
/// [`FetchError::NotFound`]. Call counts and peak concurrency are
/// recorded so tests can assert retry and worker-pool behavior.
#[derive(Default)]
pub struct ScriptedRecordSource {
    scripts: Mutex<HashMap<String, Script>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct Script {
    outcomes: VecDeque<Result<StockRecord, FetchError>>,
    last: Option<Result<StockRecord, FetchError>>,
    calls: usize,
}

impl ScriptedRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate per-call latency, so concurrent workers actually overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script the outcomes for one symbol, consumed in order.
    pub fn script(
        &self,
        symbol: impl Into<String>,
        outcomes: Vec<Result<StockRecord, FetchError>>,
    ) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(
                symbol.into(),
                Script {
                    outcomes: outcomes.into(),
                    last: None,
                    calls: 0,
                },
            );
        }
    }

    /// Shorthand: the symbol always succeeds with a fresh record.
    pub fn script_ok(&self, symbol: &str) {
        self.script(symbol, vec![Ok(StockRecord::new(symbol))]);
    }

    /// Shorthand: fail with the given errors first, then succeed.
    pub fn script_flaky(&self, symbol: &str, errors: Vec<FetchError>) {
        let mut outcomes: Vec<Result<StockRecord, FetchError>> =
            errors.into_iter().map(Err).collect();
        outcomes.push(Ok(StockRecord::new(symbol)));
        self.script(symbol, outcomes);
    }

    /// How many times `fetch_record` was called for this symbol.
    pub fn calls(&self, symbol: &str) -> usize {
        self.scripts
            .lock()
            .ok()
            .and_then(|scripts| scripts.get(symbol).map(|s| s.calls))
            .unwrap_or(0)
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    fn next_outcome(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        let mut scripts = match self.scripts.lock() {
            Ok(scripts) => scripts,
            Err(_) => {
                return Err(FetchError::NotFound {
                    resource: symbol.to_string(),
                })
            }
        };
        match scripts.get_mut(symbol) {
            Some(script) => {
                script.calls += 1;
                match script.outcomes.pop_front() {
                    Some(outcome) => {
                        script.last = Some(clone_outcome(&outcome));
                        outcome
                    }
                    None => match &script.last {
                        Some(last) => clone_outcome(last),
                        None => Err(FetchError::NotFound {
                            resource: symbol.to_string(),
                        }),
                    },
                }
            }
            None => Err(FetchError::NotFound {
                resource: symbol.to_string(),
            }),
        }
    }
}

fn clone_outcome(
    outcome: &Result<StockRecord, FetchError>,
) -> Result<StockRecord, FetchError> {
    match outcome {
        Ok(record) => Ok(record.clone()),
        Err(err) => Err(err.clone()),
    }
}

#[async_trait]
impl RecordSource for ScriptedRecordSource {
    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = self.next_outcome(symbol);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_consumed_in_order() {
        let source = ScriptedRecordSource::new();
        source.script(
            "AAPL",
            vec![
                Err(FetchError::Transport {
                    status: Some(500),
                    message: "boom".to_string(),
                }),
                Ok(StockRecord::new("AAPL")),
            ],
        );

        assert!(source.fetch_record("AAPL").await.is_err());
        assert!(source.fetch_record("AAPL").await.is_ok());
        assert_eq!(source.calls("AAPL"), 2);
    }

    #[tokio::test]
    async fn exhausted_script_repeats_last_outcome() {
        let source = ScriptedRecordSource::new();
        source.script_ok("MSFT");

        for _ in 0..3 {
            assert!(source.fetch_record("MSFT").await.is_ok());
        }
        assert_eq!(source.calls("MSFT"), 3);
    }

    #[tokio::test]
    async fn unscripted_symbol_is_not_found() {
        let source = ScriptedRecordSource::new();
        let err = source.fetch_record("ZZZZ").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn flaky_script_fails_then_succeeds() {
        let source = ScriptedRecordSource::new();
        source.script_flaky(
            "NVDA",
            vec![FetchError::Transport {
                status: None,
                message: "connection reset".to_string(),
            }],
        );

        assert!(source.fetch_record("NVDA").await.is_err());
        let record = source.fetch_record("NVDA").await.unwrap();
        assert_eq!(record.symbol, "NVDA");
        // Repeats the final success from here on.
        assert!(source.fetch_record("NVDA").await.is_ok());
    }
}
