//! Chat-completion request types and the transport abstraction.
//!
//! The queue never talks HTTP directly; it goes through a [`ChatTransport`] so
//! the retry and concurrency policy can be exercised without a network.

use cardgraph_core::AppResult;
use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible `/chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,

    /// Sampling temperature; labeling always uses 0
    pub temperature: f32,

    /// Conversation, system message first
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Create a deterministic (temperature 0) request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            messages,
        }
    }
}

/// Raw HTTP outcome of one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429 and 5xx are worth retrying; everything else is final.
    pub fn is_retriable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

/// Trait for whatever carries a chat request to the provider.
///
/// Implementations return `Ok` for any HTTP response, whatever its status,
/// and `Err` only when no response was obtained at all.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Get the transport name (e.g., "openai").
    fn name(&self) -> &str;

    /// POST `request` to `url` authenticated with `api_key`.
    async fn post_chat(
        &self,
        url: &str,
        api_key: &str,
        request: &ChatRequest,
    ) -> AppResult<TransportResponse>;
}
