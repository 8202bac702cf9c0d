//! The batch orchestrator: rounds, workers and the retry queue.

use crate::report::{BatchReport, BatchStats};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use stockpile_core::{new_run_id, BatchConfig, FetchError, RunId, StockRecord, StockpileResult};
use stockpile_fetch::RecordSource;
use tokio::sync::Mutex;

/// Drives one [`RecordSource`] across many identifiers.
///
/// A run is a sequence of dispatch rounds. The first round covers every
/// deduplicated input symbol; each later round covers the symbols whose
/// previous attempt failed retryably, after a cooldown. A fatal
/// authentication error stops dispatch: in-flight fetches drain, queued
/// symbols are abandoned, and the run returns the error.
pub struct BatchProcessor<S> {
    source: Arc<S>,
    config: BatchConfig,
}

/// All mutable state of a run, behind a single lock.
struct BatchState {
    /// Work remaining in the current round.
    queue: VecDeque<String>,
    records: HashMap<String, StockRecord>,
    /// Symbols that failed permanently.
    failed: HashSet<String>,
    /// Symbols awaiting the next round, bounded by config.
    retry: VecDeque<String>,
    /// Count of retry candidates rejected by a full queue.
    dropped: usize,
    /// First fatal error observed; stops all further dispatch.
    fatal: Option<FetchError>,
}

impl<S: RecordSource + 'static> BatchProcessor<S> {
    pub fn new(source: Arc<S>, config: BatchConfig) -> Self {
        Self { source, config }
    }

    /// Process every symbol, retrying failures across bounded rounds.
    ///
    /// Returns the assembled records and run statistics. The only error
    /// path is fatal: a rejected API key aborts the run; every other
    /// failure is absorbed into the per-symbol failed set.
    pub async fn run(&self, symbols: &[String]) -> StockpileResult<BatchReport> {
        let run_id = new_run_id();
        let symbols = dedup_symbols(symbols);
        tracing::info!(
            run_id = %run_id,
            symbols = symbols.len(),
            workers = self.config.workers,
            "Starting batch run"
        );

        if symbols.is_empty() {
            return Ok(BatchReport {
                run_id,
                records: HashMap::new(),
                failed: HashSet::new(),
                stats: BatchStats {
                    processed: 0,
                    failed: 0,
                    dropped: 0,
                    rounds: 0,
                },
            });
        }

        let state = Arc::new(Mutex::new(BatchState {
            queue: symbols.into(),
            records: HashMap::new(),
            failed: HashSet::new(),
            retry: VecDeque::new(),
            dropped: 0,
            fatal: None,
        }));

        let mut rounds: u32 = 0;
        loop {
            rounds += 1;
            let queued = state.lock().await.queue.len();
            let workers = self.config.workers.max(1).min(queued);
            tracing::info!(run_id = %run_id, round = rounds, queued, workers, "Dispatching round");

            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let source = Arc::clone(&self.source);
                let state = Arc::clone(&state);
                let retry_capacity = self.config.retry_queue_capacity;
                handles.push(tokio::spawn(async move {
                    worker_loop(run_id, worker, source, state, retry_capacity).await;
                }));
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    tracing::error!(run_id = %run_id, error = %err, "Worker task failed");
                }
            }

            let mut st = state.lock().await;
            if let Some(err) = st.fatal.take() {
                tracing::error!(run_id = %run_id, error = %err, "Fatal error, aborting run");
                return Err(err.into());
            }
            if st.retry.is_empty() {
                break;
            }
            if rounds > self.config.max_retry_rounds {
                let leftover: Vec<String> = st.retry.drain(..).collect();
                tracing::warn!(
                    run_id = %run_id,
                    count = leftover.len(),
                    "Retry rounds exhausted, remaining symbols fail permanently"
                );
                st.failed.extend(leftover);
                break;
            }

            let pending: Vec<String> = st.retry.drain(..).collect();
            st.queue.extend(pending);
            let requeued = st.queue.len();
            drop(st);

            tracing::info!(
                run_id = %run_id,
                round = rounds,
                requeued,
                cooldown_secs = self.config.round_cooldown_secs,
                "Cooling down before retry round"
            );
            tokio::time::sleep(self.config.round_cooldown()).await;
        }

        let mut st = state.lock().await;
        let records = std::mem::take(&mut st.records);
        let failed = std::mem::take(&mut st.failed);
        let stats = BatchStats {
            processed: records.len(),
            failed: failed.len(),
            dropped: st.dropped,
            rounds,
        };
        tracing::info!(
            run_id = %run_id,
            processed = stats.processed,
            failed = stats.failed,
            dropped = stats.dropped,
            rounds = stats.rounds,
            success_rate = stats.success_rate(),
            "Batch run complete"
        );

        Ok(BatchReport {
            run_id,
            records,
            failed,
            stats,
        })
    }
}

/// One worker: pop, fetch, apply, until the queue empties or a fatal
/// error is flagged. The lock is never held across a fetch.
async fn worker_loop<S: RecordSource>(
    run_id: RunId,
    worker: usize,
    source: Arc<S>,
    state: Arc<Mutex<BatchState>>,
    retry_capacity: usize,
) {
    loop {
        let symbol = {
            let mut st = state.lock().await;
            if st.fatal.is_some() {
                break;
            }
            match st.queue.pop_front() {
                Some(symbol) => symbol,
                None => break,
            }
        };

        tracing::debug!(run_id = %run_id, worker, symbol = %symbol, "Fetching record");
        let outcome = source.fetch_record(&symbol).await;

        let mut st = state.lock().await;
        match outcome {
            Ok(record) => {
                st.records.insert(symbol, record);
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(
                    run_id = %run_id,
                    worker,
                    symbol = %symbol,
                    error = %err,
                    "Fatal error, stopping dispatch"
                );
                if st.fatal.is_none() {
                    st.fatal = Some(err);
                }
                break;
            }
            Err(err) => {
                if st.retry.len() < retry_capacity {
                    tracing::warn!(
                        run_id = %run_id,
                        worker,
                        symbol = %symbol,
                        error = %err,
                        "Attempt failed, queued for retry"
                    );
                    st.retry.push_back(symbol);
                } else {
                    tracing::warn!(
                        run_id = %run_id,
                        worker,
                        symbol = %symbol,
                        error = %err,
                        "Retry queue full, symbol fails permanently"
                    );
                    st.dropped += 1;
                    st.failed.insert(symbol);
                }
            }
        }
    }
}

/// Normalize and deduplicate, keeping first-seen order.
fn dedup_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for symbol in symbols {
        let normalized = symbol.trim().to_uppercase();
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            unique.push(normalized);
        }
    }
    unique
}
