pub mod completions;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{ Deserialize, Serialize };
use std::sync::Arc;
use thiserror::Error;
use super::LlmConfig;
use self::completions::CompletionsClient;

/// One entry of the `messages` array sent to a completion endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_string(), content: content.into() }
    }
}

/// `content` is `None` when the endpoint answered successfully but gave no
/// usable text (no choices, or a blank first choice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat client is not configured (missing API key)")]
    NotConfigured,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("insufficient balance on the completion account")]
    InsufficientBalance,
    #[error("completion API returned {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
    },
    #[error("malformed completion payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

/// DeepSeek and OpenAI speak the same wire format; only the defaults differ.
pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client: Arc<dyn ChatClient> = Arc::new(CompletionsClient::from_config(config)?);
    Ok(client)
}
