//! OpenAI-compatible reasoning client
//!
//! Stateless request/response client. Works with OpenRouter (default),
//! OpenAI, vLLM and other servers exposing `/chat/completions`.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use voice_agent_config::LlmSettings;
use voice_agent_core::{
    Completion, CompletionOptions, LanguageModel, Message, TextStream, TokenUsage,
};

use crate::sse::SseDecoder;
use crate::LlmError;

/// Stream of content deltas from an incremental completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Base URL, e.g. https://openrouter.ai/api/v1
    pub endpoint: String,
    pub api_key: String,
    /// Model used when callers pass an empty model name
    pub model: String,
    pub timeout: Duration,
    pub referer: String,
    pub title: String,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self::from_settings(&LlmSettings::default())
    }
}

impl ReasoningConfig {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.model.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            referer: settings.referer.clone(),
            title: settings.title.clone(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Reasoning client
pub struct ReasoningClient {
    config: ReasoningConfig,
    client: Client,
}

impl ReasoningClient {
    pub fn new(config: ReasoningConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "API key is required for the reasoning endpoint".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", self.config.api_key);
        if let Ok(val) = HeaderValue::from_str(&auth_value) {
            headers.insert(AUTHORIZATION, val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.referer) {
            headers.insert("HTTP-Referer", val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.title) {
            headers.insert("X-Title", val);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        model: &'a str,
        options: &CompletionOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: if model.is_empty() { &self.config.model } else { model },
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stream,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        tracing::debug!(
            model = request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or(body);

        tracing::warn!(status = status.as_u16(), error = %message, "Completion request failed");
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Single-shot completion
    pub async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let request = self.build_request(messages, model, options, false);
        let response = self.send(&request).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = body.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Completion {
            content,
            usage: body.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    /// Incremental completion
    ///
    /// Transport and status errors are reported before any delta is
    /// produced. The stream ends at the `[DONE]` sentinel or when the
    /// connection closes.
    pub async fn stream_complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<DeltaStream, LlmError> {
        let request = self.build_request(messages, model, options, true);
        let response = self.send(&request).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for delta in decoder.push(&chunk) {
                            yield Ok(delta);
                        }
                        if decoder.is_done() {
                            break;
                        }
                    }
                    Err(e) => {
                        yield Err(LlmError::Network(e.to_string()));
                        break;
                    }
                }
            }

            if let Some(delta) = decoder.finish() {
                yield Ok(delta);
            }
        }))
    }
}

#[async_trait]
impl LanguageModel for ReasoningClient {
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> voice_agent_core::Result<Completion> {
        Ok(ReasoningClient::complete(self, messages, model, options).await?)
    }

    async fn stream_complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> voice_agent_core::Result<TextStream> {
        let stream = ReasoningClient::stream_complete(self, messages, model, options).await?;
        Ok(Box::pin(
            stream.map(|item| item.map_err(voice_agent_core::Error::from)),
        ))
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}
