//! STOCKPILE Store - Persistent Write-Through Cache
//!
//! A JSON-file-backed key-value store that decouples fetch volume from
//! provider quota. Every insert is written through to disk so an
//! interrupted run resumes against a warm cache. Reads treat entries older
//! than the TTL as absent; physical removal of stale entries happens on
//! load and on overwrite, never on the read path.

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheStats, CacheStore, CacheTtl};
