//! # Stockpile Screener - Value Screen Pipeline
//!
//! The top of the stack: load a ticker universe, batch-fetch records,
//! apply the value thresholds, generate insights for the stocks that
//! pass, and append everything to a CSV that doubles as the resume
//! state for interrupted runs.

pub mod pipeline;
pub mod universe;
pub mod writer;

pub use pipeline::{ScreenPipeline, ScreenSummary};
pub use universe::load_universe;
pub use writer::{resume_symbols, ScreenRow, ScreenWriter};
