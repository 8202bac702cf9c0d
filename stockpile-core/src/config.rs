//! Configuration types
//!
//! Flat numeric fields (milliseconds, seconds, hours) so every struct
//! deserializes cleanly from TOML; `Duration` accessors for the code that
//! consumes them. Defaults are the production constants. API keys are NOT
//! configuration - they come from the environment and never appear here.

use crate::error::{ConfigError, StockpileResult};
use crate::record::StockRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Request pacing and window policy for the provider rate limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Minimum spacing between admissions, in milliseconds.
    pub min_spacing_ms: u64,
    /// Upper bound of the uniform random jitter added to the spacing.
    pub max_jitter_ms: u64,
    /// Sliding window length, in seconds.
    pub window_secs: u64,
    /// Maximum admissions inside one trailing window.
    pub max_per_window: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: 2_000,
            max_jitter_ms: 1_000,
            window_secs: 60,
            max_per_window: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `STOCKPILE_MIN_SPACING_MS`: minimum spacing between requests (default: 2000)
    /// - `STOCKPILE_MAX_JITTER_MS`: jitter upper bound (default: 1000)
    /// - `STOCKPILE_WINDOW_SECS`: sliding window length (default: 60)
    /// - `STOCKPILE_MAX_PER_WINDOW`: admissions per window (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            min_spacing_ms: std::env::var("STOCKPILE_MIN_SPACING_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_spacing_ms),
            max_jitter_ms: std::env::var("STOCKPILE_MAX_JITTER_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_jitter_ms),
            window_secs: std::env::var("STOCKPILE_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.window_secs),
            max_per_window: std::env::var("STOCKPILE_MAX_PER_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_per_window),
        }
    }
}

/// Provider transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Base URL of the provider REST API.
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Mandatory cooldown observed after a provider-side 429, in seconds.
    pub rate_limit_cooldown_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://financialmodelingprep.com/api/v3".to_string(),
            request_timeout_secs: 30,
            rate_limit_cooldown_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

/// Record cache location and freshness policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache file location.
    pub path: PathBuf,
    /// Entries older than this are treated as absent, in hours.
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache/stock_data_cache.json"),
            ttl_hours: 24,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Fixed worker pool size.
    pub workers: usize,
    /// Additional rounds granted to the retry queue after the first pass.
    pub max_retry_rounds: u32,
    /// Retry queue capacity; overflow identifiers become terminal failures.
    pub retry_queue_capacity: usize,
    /// Pause between retry rounds, in seconds.
    pub round_cooldown_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_retry_rounds: 3,
            retry_queue_capacity: 1_000,
            round_cooldown_secs: 60,
        }
    }
}

impl BatchConfig {
    pub fn round_cooldown(&self) -> Duration {
        Duration::from_secs(self.round_cooldown_secs)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `STOCKPILE_WORKERS`: worker pool size (default: 3)
    /// - `STOCKPILE_MAX_RETRY_ROUNDS`: retry rounds (default: 3)
    /// - `STOCKPILE_RETRY_QUEUE_CAPACITY`: retry queue bound (default: 1000)
    /// - `STOCKPILE_ROUND_COOLDOWN_SECS`: pause between rounds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            workers: std::env::var("STOCKPILE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            max_retry_rounds: std::env::var("STOCKPILE_MAX_RETRY_ROUNDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retry_rounds),
            retry_queue_capacity: std::env::var("STOCKPILE_RETRY_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_queue_capacity),
            round_cooldown_secs: std::env::var("STOCKPILE_ROUND_COOLDOWN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.round_cooldown_secs),
        }
    }
}

/// Insight generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: String,
    /// Chat model used for insight generation.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Attempts before an insight degrades to its fallback text.
    pub max_retries: u32,
    pub max_concurrent_requests: usize,
    pub min_request_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Insight cache file; entries never expire.
    pub cache_path: PathBuf,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 250,
            temperature: 0.2,
            max_retries: 3,
            max_concurrent_requests: 2,
            min_request_interval_ms: 500,
            request_timeout_secs: 30,
            cache_path: PathBuf::from("cache/openai_cache.json"),
        }
    }
}

impl LlmConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Value screen thresholds. A record passes only when every present
/// metric satisfies its bound; a missing metric fails the screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValueThresholds {
    pub max_pe: f64,
    pub max_price_to_book: f64,
    pub max_debt_to_equity: f64,
    pub min_roe: f64,
}

impl Default for ValueThresholds {
    fn default() -> Self {
        Self {
            max_pe: 10.0,
            max_price_to_book: 1.5,
            max_debt_to_equity: 1.0,
            min_roe: 0.12,
        }
    }
}

impl ValueThresholds {
    /// Evaluate a record against the screen.
    ///
    /// All four metrics must be present and satisfy their bound; a record
    /// missing any of them fails, it is never waved through.
    pub fn matches(&self, record: &StockRecord) -> bool {
        let (Some(pe), Some(pb), Some(de), Some(roe)) = (
            record.pe_ratio,
            record.price_to_book,
            record.debt_to_equity,
            record.roe,
        ) else {
            return false;
        };

        pe < self.max_pe
            && pb < self.max_price_to_book
            && de < self.max_debt_to_equity
            && roe > self.min_roe
    }
}

/// Screening pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    pub thresholds: ValueThresholds,
    /// Output CSV; also read for resume on startup.
    pub output_path: PathBuf,
    /// Flush the output after this many appended rows.
    pub checkpoint_interval: usize,
    /// JSON ticker list files merged into the screening universe.
    pub universe_paths: Vec<PathBuf>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            thresholds: ValueThresholds::default(),
            output_path: PathBuf::from("stock_analysis.csv"),
            checkpoint_interval: 10,
            universe_paths: Vec::new(),
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StockpileConfig {
    pub rate_limit: RateLimitConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub llm: LlmConfig,
    pub screen: ScreenConfig,
}

impl StockpileConfig {
    /// Defaults with the operational sections overridden from the
    /// environment. Used when no config file is given.
    pub fn from_env() -> Self {
        Self {
            rate_limit: RateLimitConfig::from_env(),
            batch: BatchConfig::from_env(),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(StockpileError::Config) if invalid.
    pub fn validate(&self) -> StockpileResult<()> {
        if self.rate_limit.max_per_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.max_per_window".to_string(),
                value: self.rate_limit.max_per_window.to_string(),
                reason: "max_per_window must be greater than 0".to_string(),
            }
            .into());
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.window_secs".to_string(),
                value: self.rate_limit.window_secs.to_string(),
                reason: "window_secs must be greater than 0".to_string(),
            }
            .into());
        }

        if self.fetch.base_url.is_empty() || !self.fetch.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "fetch.base_url".to_string(),
                value: self.fetch.base_url.clone(),
                reason: "base_url must be an http(s) URL".to_string(),
            }
            .into());
        }

        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.request_timeout_secs".to_string(),
                value: self.fetch.request_timeout_secs.to_string(),
                reason: "request_timeout_secs must be greater than 0".to_string(),
            }
            .into());
        }

        if self.cache.ttl_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_hours".to_string(),
                value: self.cache.ttl_hours.to_string(),
                reason: "ttl_hours must be greater than 0".to_string(),
            }
            .into());
        }

        if self.batch.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.workers".to_string(),
                value: self.batch.workers.to_string(),
                reason: "workers must be greater than 0".to_string(),
            }
            .into());
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                value: self.llm.max_tokens.to_string(),
                reason: "max_tokens must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                value: self.llm.temperature.to_string(),
                reason: "temperature must be between 0.0 and 2.0".to_string(),
            }
            .into());
        }

        if self.llm.base_url.is_empty() || !self.llm.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "llm.base_url".to_string(),
                value: self.llm.base_url.clone(),
                reason: "base_url must be an http(s) URL".to_string(),
            }
            .into());
        }

        if self.llm.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_concurrent_requests".to_string(),
                value: self.llm.max_concurrent_requests.to_string(),
                reason: "max_concurrent_requests must be greater than 0".to_string(),
            }
            .into());
        }

        if self.screen.checkpoint_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "screen.checkpoint_interval".to_string(),
                value: self.screen.checkpoint_interval.to_string(),
                reason: "checkpoint_interval must be greater than 0".to_string(),
            }
            .into());
        }

        let t = &self.screen.thresholds;
        for (field, value) in [
            ("screen.thresholds.max_pe", t.max_pe),
            ("screen.thresholds.max_price_to_book", t.max_price_to_book),
            (
                "screen.thresholds.max_debt_to_equity",
                t.max_debt_to_equity,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "threshold must be a positive number".to_string(),
                }
                .into());
            }
        }
        if !t.min_roe.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "screen.thresholds.min_roe".to_string(),
                value: t.min_roe.to_string(),
                reason: "min_roe must be a finite number".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockpileError;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn invalid_field(result: StockpileResult<()>) -> String {
        match result {
            Err(StockpileError::Config(ConfigError::InvalidValue { field, .. })) => field,
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = StockpileConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_carry_production_constants() {
        let config = StockpileConfig::default();
        assert_eq!(config.rate_limit.min_spacing_ms, 2_000);
        assert_eq!(config.rate_limit.max_per_window, 30);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.batch.workers, 3);
        assert_eq!(config.batch.max_retry_rounds, 3);
        assert_eq!(config.batch.retry_queue_capacity, 1_000);
        assert_eq!(config.llm.max_retries, 3);
    }

    #[test]
    fn test_duration_accessors() {
        let config = StockpileConfig::default();
        assert_eq!(config.rate_limit.min_spacing(), Duration::from_secs(2));
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.cache.ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(config.batch.round_cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_zero_window_cap() {
        let mut config = StockpileConfig::default();
        config.rate_limit.max_per_window = 0;
        assert_eq!(
            invalid_field(config.validate()),
            "rate_limit.max_per_window"
        );
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = StockpileConfig::default();
        config.batch.workers = 0;
        assert_eq!(invalid_field(config.validate()), "batch.workers");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = StockpileConfig::default();
        config.fetch.base_url = "ftp://example.com".to_string();
        assert_eq!(invalid_field(config.validate()), "fetch.base_url");
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let mut config = StockpileConfig::default();
        config.llm.temperature = 3.5;
        assert_eq!(invalid_field(config.validate()), "llm.temperature");
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let mut config = StockpileConfig::default();
        config.screen.thresholds.max_pe = 0.0;
        assert_eq!(invalid_field(config.validate()), "screen.thresholds.max_pe");
    }

    #[test]
    fn test_zero_retry_queue_capacity_is_legal() {
        let mut config = StockpileConfig::default();
        config.batch.retry_queue_capacity = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_from_env_overrides() {
        let _workers = EnvVarGuard::set("STOCKPILE_WORKERS", Some("5"));
        let _rounds = EnvVarGuard::set("STOCKPILE_MAX_RETRY_ROUNDS", Some("1"));
        let config = BatchConfig::from_env();
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_retry_rounds, 1);
        assert_eq!(config.retry_queue_capacity, 1_000);
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        let _guard = EnvVarGuard::set("STOCKPILE_WINDOW_SECS", Some("not-a-number"));
        let config = RateLimitConfig::from_env();
        assert_eq!(config.window_secs, 60);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: StockpileConfig =
            serde_json::from_str(r#"{"batch": {"workers": 8}}"#).unwrap();
        assert_eq!(config.batch.workers, 8);
        assert_eq!(config.batch.max_retry_rounds, 3);
        assert_eq!(config.rate_limit.max_per_window, 30);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<StockpileConfig, _> =
            serde_json::from_str(r#"{"batch": {"woorkers": 8}}"#);
        assert!(result.is_err());
    }

    fn value_record() -> StockRecord {
        let mut record = StockRecord::new("ACME");
        record.pe_ratio = Some(8.0);
        record.price_to_book = Some(1.2);
        record.debt_to_equity = Some(0.5);
        record.roe = Some(0.18);
        record
    }

    #[test]
    fn test_thresholds_match_a_value_stock() {
        assert!(ValueThresholds::default().matches(&value_record()));
    }

    #[test]
    fn test_thresholds_reject_each_breached_bound() {
        let thresholds = ValueThresholds::default();

        let mut expensive = value_record();
        expensive.pe_ratio = Some(25.0);
        assert!(!thresholds.matches(&expensive));

        let mut pricey_book = value_record();
        pricey_book.price_to_book = Some(3.0);
        assert!(!thresholds.matches(&pricey_book));

        let mut leveraged = value_record();
        leveraged.debt_to_equity = Some(2.5);
        assert!(!thresholds.matches(&leveraged));

        let mut low_return = value_record();
        low_return.roe = Some(0.05);
        assert!(!thresholds.matches(&low_return));
    }

    #[test]
    fn test_thresholds_reject_missing_metrics() {
        let thresholds = ValueThresholds::default();

        let empty = StockRecord::new("ACME");
        assert!(!thresholds.matches(&empty));

        let mut partial = value_record();
        partial.roe = None;
        assert!(!thresholds.matches(&partial));
    }

    #[test]
    fn test_thresholds_compare_strictly() {
        let thresholds = ValueThresholds::default();

        // Bounds themselves do not pass.
        let mut at_pe_bound = value_record();
        at_pe_bound.pe_ratio = Some(10.0);
        assert!(!thresholds.matches(&at_pe_bound));

        let mut at_roe_bound = value_record();
        at_roe_bound.roe = Some(0.12);
        assert!(!thresholds.matches(&at_roe_bound));
    }
}
