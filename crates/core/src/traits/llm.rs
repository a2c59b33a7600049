//! Language model trait

use crate::{Completion, CompletionOptions, Message, Result};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Lazy, finite sequence of text deltas
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Remote text-completion service
///
/// Implementations:
/// - `ReasoningClient` - OpenAI-compatible chat completions endpoint
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Single-shot completion
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion>;

    /// Incremental completion. The stream is not restartable.
    async fn stream_complete(
        &self,
        messages: &[Message],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<TextStream>;

    /// Model used when the caller has no preference
    fn default_model(&self) -> &str;
}
