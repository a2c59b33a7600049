//! Error taxonomy shared by every crate in the workspace

use thiserror::Error;

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across crate boundaries
///
/// Crate-local errors (`LlmError`, `RagError`, ...) convert into this type so
/// the orchestrator can tag them with a stage and publish them as events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Reported by the capture platform (recognition failure, no match)
    #[error("Capture error: {0}")]
    Capture(String),

    /// Non-2xx response or network failure against the reasoning endpoint
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The provider answered but returned zero completions
    #[error("No response generated from LLM")]
    EmptyResponse,

    /// Reported by the synthesis platform
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure raised by a response generator
    #[error("Generation error: {0}")]
    Generation(String),
}

impl Error {
    /// Build a transport error in the provider-facing message format
    pub fn transport(status: Option<u16>, detail: impl AsRef<str>) -> Self {
        let message = match status {
            Some(code) => format!("LLM API error: {} - {}", code, detail.as_ref()),
            None => format!("LLM API error: {}", detail.as_ref()),
        };
        Error::Transport { status, message }
    }

    /// Stable label used in events and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Capture(_) => "capture",
            Error::Transport { .. } => "transport",
            Error::EmptyResponse => "empty_response",
            Error::Synthesis(_) => "synthesis",
            Error::Retrieval(_) => "retrieval",
            Error::InvalidResponse(_) => "invalid_response",
            Error::Config(_) => "config",
            Error::Generation(_) => "generation",
        }
    }
}
