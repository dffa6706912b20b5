//! Summaries from an OpenAI-compatible `/v1/chat/completions` endpoint
//! (Ollama, llama.cpp server, vLLM, or the hosted API).

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::SummaryProvider;
use crate::config::SummaryConfig;

const SYSTEM_PROMPT: &str =
    "You condense chat history into two or three sentences of context for an assistant.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct ChatSummarizer {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    http: reqwest::blocking::Client,
}

impl ChatSummarizer {
    pub fn new(config: &SummaryConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client for summarizer")?;

        Ok(Self {
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            http,
        })
    }

    fn request_body<'a>(&'a self, prompt: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.into(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.2,
        }
    }
}

impl SummaryProvider for ChatSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String> {
        let mut request = self.http.post(&self.endpoint).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .with_context(|| format!("summary request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("summary endpoint returned {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .context("failed to parse chat-completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .context("chat-completions response had no content")?;

        tracing::debug!(chars = content.len(), "summary generated");
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
