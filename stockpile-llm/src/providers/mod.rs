//! Insight provider implementations.

pub mod openai;

pub use openai::OpenAiInsightProvider;
