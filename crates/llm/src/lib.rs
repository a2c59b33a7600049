//! Reasoning client for remote text-completion services
//!
//! Features:
//! - OpenAI-compatible chat completions (OpenRouter by default)
//! - Single-shot and incremental (SSE) completion
//! - Prompt assembly from conversation history

pub mod client;
pub mod prompt;
pub mod sse;

pub use client::{DeltaStream, ReasoningClient, ReasoningConfig};
pub use prompt::PromptBuilder;
pub use sse::SseDecoder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    /// Non-2xx response; `message` is the provider detail or status reason
    #[error("LLM API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("No response generated from LLM")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for voice_agent_core::Error {
    fn from(err: LlmError) -> Self {
        use voice_agent_core::Error;

        match err {
            LlmError::Api { status, message } => Error::transport(Some(status), message),
            LlmError::Network(message) => Error::transport(None, message),
            LlmError::EmptyResponse => Error::EmptyResponse,
            LlmError::InvalidResponse(message) => Error::InvalidResponse(message),
            LlmError::Configuration(message) => Error::Config(message),
        }
    }
}
