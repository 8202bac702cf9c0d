//! Market-data provider implementations.
//!
//! One provider today: Financial Modeling Prep. The cache-first fetch
//! flow, status mapping and record assembly live under [`fmp`]; new
//! providers plug in by implementing [`crate::RecordSource`].

pub mod fmp;

pub use fmp::{probe_auth, FmpClient, FmpRecordSource};
