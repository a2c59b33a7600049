//! Conversational Agents
//!
//! Features:
//! - Persona presets (general, customer support, healthcare, research)
//! - Prompt assembly with a bounded history window
//! - Retrieval-augmented replies from a shared lexical index
//! - Optional fallback reply instead of a failed turn

pub mod agent;
pub mod persona;

pub use agent::ConversationalAgent;
pub use persona::{AgentPersona, Escalation};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] voice_agent_core::Error),

    #[error("No response generated from LLM")]
    EmptyReply,
}

impl From<AgentError> for voice_agent_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Llm(e) => e,
            AgentError::EmptyReply => voice_agent_core::Error::EmptyResponse,
        }
    }
}
