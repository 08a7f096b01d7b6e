use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Base64 image data.
    InlineData { mime_type: String, data: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![ContentPart::Text(text.into())],
        }
    }
}

#[derive(Clone)]
pub struct ChatRequest {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    /// Prior history followed by the new user content.
    pub messages: Vec<ChatMessage>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt)
            .field("messages", &format!("[{} messages]", self.messages.len()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Done {
        tokens_in: Option<i64>,
        tokens_out: Option<i64>,
    },
    Error(String),
}
