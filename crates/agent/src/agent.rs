//! Conversational agent
//!
//! Generates replies through a [`LanguageModel`], optionally grounding them
//! in fragments retrieved from a shared [`RetrievalIndex`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::persona::AgentPersona;
use crate::AgentError;
use voice_agent_config::Settings;
use voice_agent_core::{
    CompletionOptions, ConversationTurn, LanguageModel, Message, ResponseGenerator,
};
use voice_agent_llm::PromptBuilder;
use voice_agent_rag::RetrievalIndex;

/// Retrieval wiring for an agent
#[derive(Clone)]
struct Retrieval {
    index: Arc<RetrievalIndex>,
    max_results: usize,
}

/// Persona-driven response generator
pub struct ConversationalAgent {
    llm: Arc<dyn LanguageModel>,
    persona: AgentPersona,
    model: String,
    options: CompletionOptions,
    history_window: usize,
    retrieval: Option<Retrieval>,
    fallback_reply: Option<String>,
}

impl ConversationalAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, persona: AgentPersona) -> Self {
        let model = llm.default_model().to_string();
        let options = persona.completion_options(CompletionOptions::default());
        Self {
            llm,
            persona,
            model,
            options,
            history_window: voice_agent_config::constants::agent::HISTORY_WINDOW,
            retrieval: None,
            fallback_reply: None,
        }
    }

    /// Build from settings
    ///
    /// The persona preset overrides the configured temperature and
    /// `max_tokens`; `top_p` is taken as configured.
    pub fn from_settings(llm: Arc<dyn LanguageModel>, settings: &Settings) -> Self {
        let persona = AgentPersona::from_kind(settings.agent.persona);
        let base = CompletionOptions::default()
            .with_max_tokens(settings.llm.max_tokens)
            .with_temperature(settings.llm.temperature)
            .with_top_p(settings.llm.top_p);

        let mut agent = Self::new(llm, persona).with_history_window(settings.agent.history_window);
        agent.options = agent.persona.completion_options(base);
        agent.fallback_reply = settings.agent.fallback_reply.clone();
        agent
    }

    /// Inject up to `max_results` retrieved fragments into every prompt
    pub fn with_retrieval(mut self, index: Arc<RetrievalIndex>, max_results: usize) -> Self {
        self.retrieval = Some(Retrieval { index, max_results });
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Reply with `text` instead of failing the turn
    pub fn with_fallback_reply(mut self, text: impl Into<String>) -> Self {
        self.fallback_reply = Some(text.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn persona(&self) -> &AgentPersona {
        &self.persona
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    pub fn has_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }

    /// Message list for one reasoning call
    pub fn build_messages(&self, user_text: &str, history: &[ConversationTurn]) -> Vec<Message> {
        let mut builder = PromptBuilder::new()
            .system_prompt(&self.persona.system_prompt)
            .with_history(history, self.history_window)
            .user_message(user_text);

        if let Some(context) = &self.persona.situational_context {
            builder = builder.system_prompt(context);
        }

        if let Some(retrieval) = &self.retrieval {
            let result = retrieval.index.query(user_text, retrieval.max_results);
            if !result.is_empty() {
                tracing::debug!(
                    fragments = result.fragments.len(),
                    top_score = result.scores.first().copied().unwrap_or_default(),
                    "Injecting document context"
                );
                builder = builder.with_document_context(&result.context);
            }
        }

        builder.build()
    }

    async fn generate(&self, user_text: &str, history: &[ConversationTurn]) -> Result<String, AgentError> {
        let messages = self.build_messages(user_text, history);
        let completion = self.llm.complete(&messages, &self.model, &self.options).await?;

        let content = completion.content.trim();
        if content.is_empty() {
            return Err(AgentError::EmptyReply);
        }

        if let Some(usage) = completion.usage {
            tracing::debug!(
                persona = %self.persona.name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion received"
            );
        }

        match &self.persona.escalation {
            Some(escalation) if escalation.triggered_by(user_text) => {
                tracing::info!(persona = %self.persona.name, "Escalating to a human agent");
                Ok(format!("{}\n\n{}", content, escalation.notice))
            }
            _ => Ok(content.to_string()),
        }
    }
}

#[async_trait]
impl ResponseGenerator for ConversationalAgent {
    async fn respond(&self, user_text: &str, history: &[ConversationTurn]) -> voice_agent_core::Result<String> {
        match self.generate(user_text, history).await {
            Ok(reply) => Ok(reply),
            Err(e) => match &self.fallback_reply {
                Some(fallback) => {
                    tracing::warn!(persona = %self.persona.name, error = %e, "Using fallback reply");
                    Ok(fallback.clone())
                }
                None => Err(e.into()),
            },
        }
    }

    fn name(&self) -> &str {
        &self.persona.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Map;
    use std::collections::VecDeque;
    use voice_agent_config::PersonaKind;
    use voice_agent_core::{Completion, Error, LatencyBreakdown, Role, TextStream};
    use voice_agent_rag::ChunkConfig;

    /// Records requests and answers from a queue
    struct MockModel {
        replies: Mutex<VecDeque<voice_agent_core::Result<String>>>,
        requests: Mutex<Vec<(Vec<Message>, String, CompletionOptions)>>,
    }

    impl MockModel {
        fn new(replies: Vec<voice_agent_core::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_messages(&self) -> Vec<Message> {
            self.requests.lock().last().map(|r| r.0.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LanguageModel for MockModel {
        async fn complete(
            &self,
            messages: &[Message],
            model: &str,
            options: &CompletionOptions,
        ) -> voice_agent_core::Result<Completion> {
            self.requests
                .lock()
                .push((messages.to_vec(), model.to_string(), *options));
            let content = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))?;
            Ok(Completion {
                content,
                usage: None,
            })
        }

        async fn stream_complete(
            &self,
            _messages: &[Message],
            _model: &str,
            _options: &CompletionOptions,
        ) -> voice_agent_core::Result<TextStream> {
            Err(Error::Generation("streaming not supported".to_string()))
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }
    }

    fn turn(user: &str, agent: &str) -> ConversationTurn {
        ConversationTurn {
            id: ConversationTurn::new_id(),
            timestamp: chrono::Utc::now(),
            user_input: user.to_string(),
            agent_response: agent.to_string(),
            latency: LatencyBreakdown::default(),
        }
    }

    #[tokio::test]
    async fn test_prompt_layout_with_history() {
        let llm = MockModel::new(vec![Ok("  Sure.  ".to_string())]);
        let agent = ConversationalAgent::new(llm.clone(), AgentPersona::generic())
            .with_history_window(1);

        let history = vec![turn("hi", "hello"), turn("how are you", "fine")];
        let reply = agent.respond("tell me more", &history).await.unwrap();
        assert_eq!(reply, "Sure.");

        let messages = llm.last_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[1].content, "how are you");
        assert_eq!(messages[3].content, "tell me more");

        let requests = llm.requests.lock();
        assert_eq!(requests[0].1, "mock-model");
        assert_eq!(requests[0].2.max_tokens, 150);
    }

    #[tokio::test]
    async fn test_document_context_appended() {
        let index = Arc::new(RetrievalIndex::new(ChunkConfig::default()));
        index
            .ingest("The sky is blue. Water is wet.", Map::new())
            .unwrap();

        let llm = MockModel::new(vec![]);
        let agent = ConversationalAgent::new(llm.clone(), AgentPersona::research())
            .with_retrieval(index, 3);
        agent.respond("what color is the sky", &[]).await.unwrap();

        let messages = llm.last_messages();
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.starts_with("DOCUMENT CONTEXT:\n"));
        assert!(last.content.contains("The sky is blue"));
    }

    #[tokio::test]
    async fn test_no_context_without_overlap() {
        let index = Arc::new(RetrievalIndex::new(ChunkConfig::default()));
        index.ingest("Water is wet.", Map::new()).unwrap();

        let llm = MockModel::new(vec![]);
        let agent = ConversationalAgent::new(llm.clone(), AgentPersona::research())
            .with_retrieval(index, 3);
        agent.respond("quantum", &[]).await.unwrap();

        assert_eq!(llm.last_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_support_context_and_escalation() {
        let llm = MockModel::new(vec![Ok("Sorry about that.".to_string())]);
        let agent = ConversationalAgent::new(llm.clone(), AgentPersona::customer_support());

        let reply = agent
            .respond("I want to speak to a manager", &[])
            .await
            .unwrap();
        assert!(reply.starts_with("Sorry about that.\n\n"));
        assert!(reply.ends_with("better assist with this request."));

        let messages = llm.last_messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[2].content.starts_with("Known solution areas"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let llm = MockModel::new(vec![Err(Error::transport(Some(500), "boom"))]);
        let agent = ConversationalAgent::new(llm, AgentPersona::generic());

        let err = agent.respond("hello", &[]).await.unwrap_err();
        assert_eq!(err, Error::transport(Some(500), "boom"));
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let llm = MockModel::new(vec![Ok("   ".to_string())]);
        let agent = ConversationalAgent::new(llm, AgentPersona::generic());

        let err = agent.respond("hello", &[]).await.unwrap_err();
        assert_eq!(err, Error::EmptyResponse);
    }

    #[tokio::test]
    async fn test_fallback_reply_on_failure() {
        let llm = MockModel::new(vec![Err(Error::EmptyResponse)]);
        let agent = ConversationalAgent::new(llm, AgentPersona::healthcare())
            .with_fallback_reply("Please try again.");

        assert_eq!(agent.respond("hello", &[]).await.unwrap(), "Please try again.");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.agent.persona = PersonaKind::CustomerSupport;
        settings.agent.history_window = 4;
        settings.agent.fallback_reply = Some("One moment.".to_string());
        settings.llm.top_p = 0.5;

        let agent = ConversationalAgent::from_settings(MockModel::new(vec![]), &settings);
        assert_eq!(agent.name(), "SupportBot");
        assert_eq!(agent.options().temperature, 0.2);
        assert_eq!(agent.options().top_p, 0.5);
        assert_eq!(agent.history_window, 4);
        assert_eq!(agent.fallback_reply.as_deref(), Some("One moment."));
    }
}
