//! STOCKPILE Core - Shared Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no I/O, no business logic.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod record;

pub use config::{
    BatchConfig, CacheConfig, FetchConfig, LlmConfig, RateLimitConfig, ScreenConfig,
    StockpileConfig, ValueThresholds,
};
pub use endpoint::Endpoint;
pub use error::{ConfigError, FetchError, StockpileError, StockpileResult, StorageError};
pub use record::{FetchRequest, StockRecord};

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Identifier for one batch run, using UUIDv7 for timestamp-sortable IDs.
/// Carried in every log line the run emits so concurrent runs can be teased
/// apart in aggregated logs.
pub type RunId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 RunId (timestamp-sortable).
pub fn new_run_id() -> RunId {
    Uuid::now_v7()
}

// ============================================================================
// TESTS
// ============================================================================
