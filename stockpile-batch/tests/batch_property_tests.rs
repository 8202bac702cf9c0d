//! Property-Based Tests for the Batch Orchestrator
//!
//! **Property 1: Partition**
//!
//! For any universe of symbols and any retry budget, every deduplicated
//! input symbol SHALL end a run in exactly one of the two report buckets:
//! the assembled records or the permanently failed set.
//!
//! **Property 2: Bounded Retries**
//!
//! No symbol SHALL be attempted more than `1 + max_retry_rounds` times,
//! and symbols whose transient failures fit inside that budget SHALL
//! recover.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use stockpile_batch::BatchProcessor;
use stockpile_core::{BatchConfig, FetchError, StockpileError};
use stockpile_fetch::ScriptedRecordSource;

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

/// How one symbol behaves across the run.
#[derive(Debug, Clone)]
enum SymbolPlan {
    /// Succeeds on the first attempt.
    Succeeds,
    /// Fails with these errors in order, then succeeds.
    Flaky(Vec<FetchError>),
    /// Fails with this error on every attempt.
    NeverSucceeds(FetchError),
}

/// Strategy for retryable provider failures. Fatal authentication errors
/// are deliberately absent; they abort a run instead of feeding the retry
/// queue and are covered separately.
fn retryable_error_strategy() -> impl Strategy<Value = FetchError> {
    prop_oneof![
        (500u16..=599).prop_map(|status| FetchError::Transport {
            status: Some(status),
            message: "server error".to_string(),
        }),
        Just(FetchError::Transport {
            status: None,
            message: "connection reset".to_string(),
        }),
        prop::option::of(1u64..120).prop_map(|retry_after_secs| FetchError::RateLimited {
            retry_after_secs,
        }),
        Just(FetchError::NotFound {
            resource: "profile/ZZZZ".to_string(),
        }),
        Just(FetchError::Validation {
            endpoint: "ratios-ttm".to_string(),
            reason: "response is empty".to_string(),
        }),
    ]
}

fn symbol_plan_strategy() -> impl Strategy<Value = SymbolPlan> {
    prop_oneof![
        3 => Just(SymbolPlan::Succeeds),
        2 => prop::collection::vec(retryable_error_strategy(), 1..=3).prop_map(SymbolPlan::Flaky),
        1 => retryable_error_strategy().prop_map(SymbolPlan::NeverSucceeds),
    ]
}

/// A universe of distinct symbols, each with its own scripted behavior.
fn universe_strategy() -> impl Strategy<Value = HashMap<String, SymbolPlan>> {
    prop::collection::hash_map("[A-Z]{1,5}", symbol_plan_strategy(), 1..10)
}

/// Orchestrator configurations worth exploring: small worker pools, retry
/// budgets from zero up, and no cooldown so runs finish instantly. The
/// retry queue is oversized so capacity overflow never interferes with
/// the retry-budget properties.
fn config_strategy() -> impl Strategy<Value = BatchConfig> {
    (1usize..=4, 0u32..=4).prop_map(|(workers, max_retry_rounds)| BatchConfig {
        workers,
        max_retry_rounds,
        retry_queue_capacity: 1_000,
        round_cooldown_secs: 0,
    })
}

fn scripted_source(plans: &HashMap<String, SymbolPlan>) -> Arc<ScriptedRecordSource> {
    let source = ScriptedRecordSource::new();
    for (symbol, plan) in plans {
        match plan {
            SymbolPlan::Succeeds => source.script_ok(symbol),
            SymbolPlan::Flaky(errors) => source.script_flaky(symbol, errors.clone()),
            SymbolPlan::NeverSucceeds(error) => {
                source.script(symbol.clone(), vec![Err(error.clone())])
            }
        }
    }
    Arc::new(source)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Partition**
    ///
    /// Records and failures partition the deduplicated universe, and the
    /// run statistics agree with the report contents.
    #[test]
    fn prop_records_and_failures_partition_the_universe(
        plans in universe_strategy(),
        config in config_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let source = scripted_source(&plans);
            let processor = BatchProcessor::new(Arc::clone(&source), config);
            let input: Vec<String> = plans.keys().cloned().collect();

            let report = processor.run(&input).await.unwrap();

            prop_assert_eq!(report.records.len() + report.failed.len(), plans.len());
            for symbol in plans.keys() {
                let fetched = report.records.contains_key(symbol);
                let failed = report.failed.contains(symbol);
                prop_assert!(
                    fetched ^ failed,
                    "{} must land in exactly one bucket",
                    symbol
                );
            }

            prop_assert_eq!(report.stats.processed, report.records.len());
            prop_assert_eq!(report.stats.failed, report.failed.len());
            prop_assert!(report.stats.dropped <= report.stats.failed);
            let rate = report.stats.success_rate();
            prop_assert!((0.0..=1.0).contains(&rate), "success rate {} out of range", rate);
            Ok(())
        })?;
    }

    /// **Property 2: Bounded Retries (attempt counts)**
    ///
    /// Every symbol is attempted at least once and at most once per
    /// round; the round count itself never exceeds the configured budget.
    #[test]
    fn prop_call_counts_respect_the_round_budget(
        plans in universe_strategy(),
        config in config_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let budget = 1 + config.max_retry_rounds as usize;
            let source = scripted_source(&plans);
            let processor = BatchProcessor::new(Arc::clone(&source), config);
            let input: Vec<String> = plans.keys().cloned().collect();

            let report = processor.run(&input).await.unwrap();

            prop_assert!(report.stats.rounds >= 1);
            prop_assert!(report.stats.rounds as usize <= budget);
            for symbol in plans.keys() {
                let calls = source.calls(symbol);
                prop_assert!(calls >= 1, "{} was never attempted", symbol);
                prop_assert!(
                    calls <= budget,
                    "{} attempted {} times with a budget of {}",
                    symbol,
                    calls,
                    budget
                );
            }
            Ok(())
        })?;
    }

    /// **Property 2: Bounded Retries (recovery)**
    ///
    /// A symbol recovers exactly when its transient failures fit inside
    /// the retry budget; a persistent failer consumes the whole budget
    /// and lands in the failed set.
    #[test]
    fn prop_outcomes_follow_each_symbol_script(
        plans in universe_strategy(),
        config in config_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let max_retry_rounds = config.max_retry_rounds as usize;
            let budget = 1 + max_retry_rounds;
            let source = scripted_source(&plans);
            let processor = BatchProcessor::new(Arc::clone(&source), config);
            let input: Vec<String> = plans.keys().cloned().collect();

            let report = processor.run(&input).await.unwrap();

            for (symbol, plan) in &plans {
                match plan {
                    SymbolPlan::Succeeds => {
                        prop_assert!(report.records.contains_key(symbol));
                        prop_assert_eq!(source.calls(symbol), 1);
                    }
                    SymbolPlan::Flaky(errors) if errors.len() <= max_retry_rounds => {
                        prop_assert!(
                            report.records.contains_key(symbol),
                            "{} should recover: {} failures fit in {} retry rounds",
                            symbol,
                            errors.len(),
                            max_retry_rounds
                        );
                        prop_assert_eq!(source.calls(symbol), errors.len() + 1);
                    }
                    SymbolPlan::Flaky(_) | SymbolPlan::NeverSucceeds(_) => {
                        prop_assert!(report.failed.contains(symbol));
                        prop_assert_eq!(source.calls(symbol), budget);
                    }
                }
            }
            Ok(())
        })?;
    }

    /// **Property 1.1: Input Normalization**
    ///
    /// Duplicate, lowercase and padded renditions of a symbol collapse to
    /// a single attempt.
    #[test]
    fn prop_duplicate_input_is_fetched_once(
        symbols in prop::collection::hash_set("[A-Z]{1,5}", 1..10),
        config in config_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let source = Arc::new(ScriptedRecordSource::new());
            let mut input = Vec::new();
            for symbol in &symbols {
                source.script_ok(symbol);
                input.push(symbol.clone());
                input.push(symbol.to_lowercase());
                input.push(format!("  {}  ", symbol));
            }

            let processor = BatchProcessor::new(Arc::clone(&source), config);
            let report = processor.run(&input).await.unwrap();

            prop_assert_eq!(report.records.len(), symbols.len());
            prop_assert!(report.failed.is_empty());
            for symbol in &symbols {
                prop_assert_eq!(source.calls(symbol), 1);
            }
            Ok(())
        })?;
    }
}

// ============================================================================
// EDGE CASES EXERCISED THROUGH THE PUBLIC API
// ============================================================================

mod edge_cases {
    use super::*;

    #[tokio::test]
    async fn empty_universe_is_a_noop() {
        let source = Arc::new(ScriptedRecordSource::new());
        let processor = BatchProcessor::new(source, BatchConfig::default());

        let report = processor.run(&[]).await.unwrap();

        assert!(report.records.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.stats.rounds, 0);
    }

    #[tokio::test]
    async fn auth_rejection_is_the_only_fatal_path() {
        let source = Arc::new(ScriptedRecordSource::new());
        source.script(
            "AAPL",
            vec![Err(FetchError::Auth {
                message: "invalid api key".to_string(),
            })],
        );
        let config = BatchConfig {
            round_cooldown_secs: 0,
            ..BatchConfig::default()
        };
        let processor = BatchProcessor::new(source, config);

        let err = processor.run(&["AAPL".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            StockpileError::Fetch(FetchError::Auth { .. })
        ));
    }
}
