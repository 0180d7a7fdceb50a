//! Upstream chat capability — the only way the session talks to a model.
//!
//! `ChatBackend` is the seam: the session and persona generator depend on
//! the trait, `OpenAiClient` is the production implementation, tests plug in
//! scripted backends.

pub mod client;
pub mod sse;
pub mod types;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

pub use client::OpenAiClient;
use types::ChatRequest;

use crate::config::SessionConfig;

/// Ordered, lazily produced text fragments of one streamed response.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Errors from LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A model service that can answer once or stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One-shot completion; returns the first choice's text.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Open a streamed completion.
    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, LlmError>;
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let response = self.chat(&request).await?;
        Ok(response.text().to_string())
    }

    async fn stream(&self, mut request: ChatRequest) -> Result<FragmentStream, LlmError> {
        request.stream = true;
        self.chat_stream(&request).await
    }
}

impl OpenAiClient {
    /// Build a client from resolved session config.
    pub fn from_config(config: &SessionConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::MissingApiKey("OPENAI_API_KEY environment variable not set".into())
        })?;
        Ok(Self::with_base_url(api_key, config.base_url.clone()))
    }
}
