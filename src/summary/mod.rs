//! Summarization of retrieved context.
//!
//! [`SummaryProvider`] is a stateless single-shot call. Two variants:
//! [`digest::DigestSummarizer`] condenses the prompt locally with no model, and
//! [`openai::ChatSummarizer`] calls an OpenAI-compatible chat-completions
//! endpoint. Selected from configuration by [`create_provider`].

pub mod digest;
pub mod openai;

use anyhow::Result;

/// Turns a prompt into a short natural-language summary.
///
/// Synchronous like [`EmbeddingProvider`](crate::embedding::EmbeddingProvider);
/// callers on an async runtime go through `spawn_blocking`.
pub trait SummaryProvider: Send + Sync {
    fn summarize(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

pub fn create_provider(config: &crate::config::SummaryConfig) -> Result<Box<dyn SummaryProvider>> {
    match config.provider.as_str() {
        "digest" => Ok(Box::new(digest::DigestSummarizer::default())),
        "openai" => Ok(Box::new(openai::ChatSummarizer::new(config)?)),
        other => anyhow::bail!("unknown summary provider: {other}. Supported: digest, openai"),
    }
}
