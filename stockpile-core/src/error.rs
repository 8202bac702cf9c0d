//! Error types for stockpile operations

use thiserror::Error;

/// Fetch errors, one variant per provider failure class.
///
/// Only `Auth` is fatal to a run; every other variant is retryable and
/// feeds the orchestrator's retry queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Authentication rejected by provider: {message}")]
    Auth { message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Endpoint not found: {resource}")]
    NotFound { resource: String },

    #[error("Transport failure (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Validation failed for {endpoint}: {reason}")]
    Validation { endpoint: String, reason: String },
}

impl FetchError {
    /// Fatal errors abort the whole run instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth { .. })
    }

    /// Everything that is not fatal goes back through the retry queue.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}

/// Cache storage errors.
///
/// These are never fatal to a fetch: a failing cache degrades to a no-op
/// for that operation and the fetch proceeds against the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Cache I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialize { reason: String },

    #[error("Cache file corrupt at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingApiKey { var: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config file I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Config file parse failed: {reason}")]
    Parse { reason: String },
}

/// Master error type for all stockpile errors.
#[derive(Debug, Clone, Error)]
pub enum StockpileError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for stockpile operations.
pub type StockpileResult<T> = Result<T, StockpileError>;

// =============================================================================
// TESTS
// =============================================================================
