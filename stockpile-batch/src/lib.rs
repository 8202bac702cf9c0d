//! # Stockpile Batch - Concurrent Record Retrieval
//!
//! Drives a [`RecordSource`](stockpile_fetch::RecordSource) across a list
//! of identifiers with a small worker pool. A run moves through rounds:
//! every symbol is dispatched once, failures land in a bounded retry
//! queue, and after a cooldown the queue becomes the next round's work.
//! Rounds are capped; whatever is still failing when they run out is
//! reported as failed, never silently lost.
//!
//! All mutable run state sits behind a single async mutex, so the
//! worker protocol stays simple: pop a symbol, fetch it, apply the
//! outcome, repeat until the queue is empty or a fatal error stops the
//! run.

pub mod processor;
pub mod report;

pub use processor::BatchProcessor;
pub use report::{BatchReport, BatchStats};
