//! Raw HTTP client for the OpenAI-compatible Chat Completions API.
//!
//! No session awareness — just makes API calls via reqwest.

use reqwest::{Client, Response};

use super::sse::fragment_stream;
use super::types::{ChatRequest, ChatResponse};
use super::{FragmentStream, LlmError};

/// Raw HTTP client for `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client with the default base URL (https://api.openai.com/v1).
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".into())
    }

    /// Create a client with a custom base URL (proxies, local servers, tests).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// POST the request and map error statuses.
    async fn send(&self, request: &ChatRequest) -> Result<Response, LlmError> {
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after });
        }

        if status >= 400 {
            let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
            return Err(LlmError::ApiError {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    /// One-shot completion.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    /// Streaming completion. Setup errors (connect, auth, status) surface here;
    /// errors after the first byte surface as stream items.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream, LlmError> {
        let response = self.send(request).await?;
        Ok(fragment_stream(response.bytes_stream()))
    }
}
