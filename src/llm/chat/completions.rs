//! Wire format shared by OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use log::warn;
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ ChatClient, ChatError, CompletionResponse, PromptMessage };
use crate::llm::{ LlmConfig, LlmType };

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionPayload {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Client for any OpenAI-compatible completion endpoint (DeepSeek, OpenAI,
/// OpenRouter, a local gateway, ...).
pub struct CompletionsClient {
    http: HttpClient,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl CompletionsClient {
    /// `model` and `base_url` fall back to the provider's defaults.
    pub fn new(
        llm_type: LlmType,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let http = build_http(&api_key, timeout)?;
        Ok(Self {
            http,
            model: model.unwrap_or_else(|| llm_type.default_model().to_string()),
            base_url: base_url.unwrap_or_else(|| llm_type.default_base_url().to_string()),
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ChatError::NotConfigured)?;

        Self::new(
            config.llm_type,
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.timeout,
        )
    }
}

#[async_trait]
impl ChatClient for CompletionsClient {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, ChatError> {
        let url = endpoint(&self.base_url);
        post_completion(&self.http, &url, &self.model, messages, self.timeout).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

fn build_http(api_key: &str, timeout: Duration) -> Result<HttpClient, ChatError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| ChatError::Malformed(format!("Invalid API key format: {}", e)))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    let http = HttpClient::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()?;
    Ok(http)
}

fn endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

/// Posts one non-streaming completion request and extracts the first
/// choice's text.
async fn post_completion(
    http: &HttpClient,
    url: &str,
    model: &str,
    messages: &[PromptMessage],
    timeout: Duration
) -> Result<CompletionResponse, ChatError> {
    let req = CompletionRequest { model, messages, stream: false };

    let resp = http.post(url).json(&req).send().await.map_err(|e| {
        if e.is_timeout() { ChatError::Timeout(timeout) } else { ChatError::Transport(e) }
    })?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| {
        if e.is_timeout() { ChatError::Timeout(timeout) } else { ChatError::Transport(e) }
    })?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    parse_completion(&body)
}

fn status_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.error.message)
        .unwrap_or_else(|| "API request failed".to_string());

    if status == StatusCode::PAYMENT_REQUIRED || message.contains("Insufficient Balance") {
        warn!("Completion API reports insufficient balance ({}): {}", status, message);
        return ChatError::InsufficientBalance;
    }
    ChatError::Status { status, message }
}

fn parse_completion(body: &str) -> Result<CompletionResponse, ChatError> {
    let payload: CompletionPayload = serde_json
        ::from_str(body)
        .map_err(|e| ChatError::Malformed(e.to_string()))?;

    let content = payload.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|text| !text.trim().is_empty());

    Ok(CompletionResponse { content })
}
