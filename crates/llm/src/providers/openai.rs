//! OpenAI-compatible chat-completion transport.
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (OpenAI, OpenRouter, Ollama's `/v1`, vLLM, ...).

use crate::client::{ChatRequest, ChatTransport, TransportResponse};
use cardgraph_core::{AppError, AppResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: Client,
}

impl OpenAiTransport {
    /// Create a transport whose individual HTTP calls time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ChatTransport for OpenAiTransport {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, api_key, request), fields(model = %request.model))]
    async fn post_chat(
        &self,
        url: &str,
        api_key: &str,
        request: &ChatRequest,
    ) -> AppResult<TransportResponse> {
        debug!("Sending chat completion request to {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read response body: {}", e)))?;

        debug!("Chat completion responded with status {}", status);

        Ok(TransportResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = OpenAiTransport::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.name(), "openai");
    }
}
