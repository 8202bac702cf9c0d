//! # Stockpile LLM - Narrative Insight Generation
//!
//! Produces short narrative insights (sentiment, earnings call summary,
//! outlook, value perspective) for screened symbols via a chat
//! completions API. Generation is best-effort: every
//! [`InsightKind`] carries a fallback text, and the pipeline substitutes
//! it whenever generation fails, so a missing insight never fails a run.
//!
//! Generated insights are cached persistently, keyed by the canonical
//! messages JSON, so re-runs only pay for symbols they have not asked
//! about before.

pub mod insight;
pub mod providers;

pub use insight::InsightKind;
pub use providers::openai::OpenAiInsightProvider;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use stockpile_core::FetchError;

// ===== INSIGHT PROVIDER TRAIT =====

/// Generates one narrative insight per call.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Generate the insight text of `kind` for one ticker symbol.
    async fn generate(&self, kind: InsightKind, symbol: &str) -> Result<String, FetchError>;
}

// ===== MOCK PROVIDER (FOR TESTS) =====

/// Mock provider returning deterministic texts, or a fixed error.
#[derive(Debug, Default)]
pub struct MockInsightProvider {
    failure: Option<FetchError>,
    calls: AtomicU64,
}

impl MockInsightProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every call fails with the given error.
    pub fn failing(failure: FetchError) -> Self {
        Self {
            failure: Some(failure),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of generate calls observed.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl InsightProvider for MockInsightProvider {
    async fn generate(&self, kind: InsightKind, symbol: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(format!("{} insight for {}", kind.as_str(), symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockInsightProvider::new();
        let text = provider
            .generate(InsightKind::Sentiment, "AAPL")
            .await
            .unwrap();
        assert_eq!(text, "sentiment insight for AAPL");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn failing_mock_returns_the_configured_error() {
        let provider = MockInsightProvider::failing(FetchError::Transport {
            status: Some(503),
            message: "down".to_string(),
        });
        let err = provider
            .generate(InsightKind::Outlook, "AAPL")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(provider.calls(), 1);
    }
}
