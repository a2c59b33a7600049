//! Core traits and types for the voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - Error taxonomy
//! - Synchronous event bus
//! - Conversation records and latency statistics
//! - Language model message types
//! - Traits for capability providers and response generation

pub mod conversation;
pub mod error;
pub mod events;
pub mod llm_types;
pub mod traits;

pub use conversation::{ConversationTurn, LatencyAverages, LatencyBreakdown};
pub use error::{Error, Result};
pub use events::{BusEvent, EventBus, HandlerError, SubscriptionId};
pub use llm_types::{Completion, CompletionOptions, Message, Role, TokenUsage};

pub use traits::{
    CaptureProvider, CaptureSignal, LanguageModel, RecognitionSegment, ResponseGenerator,
    SignalSink, SpeechParams, SynthesisProvider, SynthesisSignal, TextStream,
};
