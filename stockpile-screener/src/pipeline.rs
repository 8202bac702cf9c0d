//! The end-to-end screen pipeline.

use crate::writer::{resume_symbols, ScreenRow, ScreenWriter};
use std::path::PathBuf;
use std::sync::Arc;
use stockpile_batch::{BatchProcessor, BatchStats};
use stockpile_core::{RunId, ScreenConfig, StockpileResult};
use stockpile_fetch::{RateLimiter, RecordSource};
use stockpile_llm::{InsightKind, InsightProvider};
use stockpile_store::{CacheStats, CacheStore};

/// Final accounting for one pipeline run.
#[derive(Debug, Clone)]
pub struct ScreenSummary {
    pub run_id: RunId,
    /// Records fetched and evaluated this run.
    pub screened: usize,
    /// Records that passed the value thresholds.
    pub passed: usize,
    /// Universe symbols skipped because a previous run already exported them.
    pub skipped: usize,
    pub batch: BatchStats,
    pub cache: CacheStats,
    /// Requests admitted by the rate limiter this run.
    pub admitted: u64,
    pub output_path: PathBuf,
}

/// Universe in, CSV out.
///
/// Orchestrates one run: skip already-exported symbols, batch-fetch the
/// rest, apply the thresholds, generate insights for the stocks that
/// pass, and append every evaluated record to the output file. Insight
/// generation is best-effort; a failure there fills the row with the
/// kind's fallback text and the run continues.
pub struct ScreenPipeline<S> {
    processor: BatchProcessor<S>,
    insights: Option<Arc<dyn InsightProvider>>,
    config: ScreenConfig,
    store: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
}

impl<S: RecordSource + 'static> ScreenPipeline<S> {
    pub fn new(
        processor: BatchProcessor<S>,
        insights: Option<Arc<dyn InsightProvider>>,
        config: ScreenConfig,
        store: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            processor,
            insights,
            config,
            store,
            limiter,
        }
    }

    pub async fn run(&self, universe: &[String]) -> StockpileResult<ScreenSummary> {
        let exported = resume_symbols(&self.config.output_path)?;
        if !exported.is_empty() {
            tracing::info!(
                already_exported = exported.len(),
                output = %self.config.output_path.display(),
                "Resuming previous run"
            );
        }

        let todo: Vec<String> = universe
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty() && !exported.contains(s))
            .collect();
        let skipped = universe.len() - todo.len();

        let report = self.processor.run(&todo).await?;
        if !report.failed.is_empty() {
            tracing::warn!(
                run_id = %report.run_id,
                failed = report.stats.failed,
                symbols = ?report.failed,
                "Some symbols could not be fetched this run"
            );
        }

        let mut writer =
            ScreenWriter::create(&self.config.output_path, self.config.checkpoint_interval)?;

        // Stable export order keeps diffs between runs readable.
        let mut symbols: Vec<&String> = report.records.keys().collect();
        symbols.sort();

        let mut passed = 0usize;
        for symbol in symbols {
            let record = &report.records[symbol];
            let matches = self.config.thresholds.matches(record);
            let mut row = ScreenRow::from_record(record, matches);

            if matches {
                passed += 1;
                tracing::info!(run_id = %report.run_id, symbol = %record.symbol, "Passed value screen");
                row.sentiment_insight = self.insight_text(InsightKind::Sentiment, symbol).await;
                row.earnings_insight = self.insight_text(InsightKind::EarningsCall, symbol).await;
                row.outlook_insight = self.insight_text(InsightKind::Outlook, symbol).await;
                row.value_insight = self.insight_text(InsightKind::ValuePerspective, symbol).await;
            } else {
                tracing::debug!(run_id = %report.run_id, symbol = %record.symbol, "Below thresholds");
            }

            writer.append(&row)?;
        }
        writer.flush()?;

        let summary = ScreenSummary {
            run_id: report.run_id,
            screened: report.records.len(),
            passed,
            skipped,
            batch: report.stats,
            cache: self.store.stats(),
            admitted: self.limiter.admitted_total(),
            output_path: self.config.output_path.clone(),
        };
        tracing::info!(
            run_id = %summary.run_id,
            screened = summary.screened,
            passed = summary.passed,
            skipped = summary.skipped,
            fetch_failed = summary.batch.failed,
            success_rate = summary.batch.success_rate(),
            cache_hits = summary.cache.hits,
            cache_misses = summary.cache.misses,
            admitted = summary.admitted,
            output = %summary.output_path.display(),
            "Screen run complete"
        );
        Ok(summary)
    }

    /// Insight text for a passer, or the kind's fallback.
    async fn insight_text(&self, kind: InsightKind, symbol: &str) -> String {
        let Some(provider) = &self.insights else {
            return kind.fallback().to_string();
        };
        match provider.generate(kind, symbol).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    symbol,
                    kind = %kind,
                    error = %err,
                    "Insight unavailable, using fallback"
                );
                kind.fallback().to_string()
            }
        }
    }
}
