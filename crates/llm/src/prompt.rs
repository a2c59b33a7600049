//! Prompt building
//!
//! Assembles the message list for a reasoning call: persona system prompt,
//! a window of prior turns, the current utterance and optional retrieved
//! context.

use voice_agent_core::{ConversationTurn, Message};

/// Builder for a chat message list
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the persona system prompt
    pub fn system_prompt(mut self, prompt: &str) -> Self {
        if !prompt.trim().is_empty() {
            self.messages.push(Message::system(prompt));
        }
        self
    }

    /// Add the most recent `window` turns as user/assistant pairs, oldest first
    pub fn with_history(mut self, history: &[ConversationTurn], window: usize) -> Self {
        let start = history.len().saturating_sub(window);
        for turn in &history[start..] {
            self.messages.push(Message::user(turn.user_input.as_str()));
            self.messages.push(Message::assistant(turn.agent_response.as_str()));
        }
        self
    }

    /// Add current user message
    pub fn user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    /// Add retrieved document context as a trailing system message
    pub fn with_document_context(mut self, context: &str) -> Self {
        if !context.is_empty() {
            let content = format!(
                "DOCUMENT CONTEXT:\n{}\n\nUse this information to answer the user's question when it is relevant.",
                context
            );
            self.messages.push(Message::system(content));
        }
        self
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Build final message list
    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}
