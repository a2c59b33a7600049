//! Response generation contract consumed by the turn orchestrator

use crate::{ConversationTurn, Result};
use async_trait::async_trait;

/// Turns a user utterance into the agent's reply
///
/// Any error returned is treated as a reasoning-stage failure of the current
/// turn.
#[async_trait]
pub trait ResponseGenerator: Send + Sync + 'static {
    async fn respond(&self, user_text: &str, history: &[ConversationTurn]) -> Result<String>;

    /// Generator name for logging
    fn name(&self) -> &str;
}
