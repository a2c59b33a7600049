//! Agent personas
//!
//! A persona fixes the system prompt and sampling parameters for one
//! domain. Presets cover general conversation, customer support,
//! healthcare intake and document-grounded research.

use voice_agent_config::PersonaKind;
use voice_agent_core::CompletionOptions;

/// Handoff appended to a reply when the user asks for a human
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    /// Lowercase phrases that trigger the handoff
    pub keywords: Vec<String>,
    pub notice: String,
}

impl Escalation {
    pub fn triggered_by(&self, user_text: &str) -> bool {
        let lowered = user_text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Persona definition
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPersona {
    pub kind: PersonaKind,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Extra system message placed after the user's utterance
    pub situational_context: Option<String>,
    pub escalation: Option<Escalation>,
}

impl AgentPersona {
    /// Preset for the given kind
    pub fn from_kind(kind: PersonaKind) -> Self {
        match kind {
            PersonaKind::Generic => Self::generic(),
            PersonaKind::CustomerSupport => Self::customer_support(),
            PersonaKind::Healthcare => Self::healthcare(),
            PersonaKind::Research => Self::research(),
        }
    }

    pub fn generic() -> Self {
        Self {
            kind: PersonaKind::Generic,
            name: "Assistant".to_string(),
            description: "General conversation and questions".to_string(),
            system_prompt: "You are a friendly, knowledgeable assistant in a spoken conversation. \
                Answer naturally and briefly, in under fifty words for simple questions. \
                Use everyday language and avoid lists or heavy formatting, since every reply \
                is read aloud. Ask a follow-up question when it keeps the conversation going."
                .to_string(),
            temperature: 0.7,
            max_tokens: 150,
            situational_context: None,
            escalation: None,
        }
    }

    pub fn customer_support() -> Self {
        Self {
            kind: PersonaKind::CustomerSupport,
            name: "SupportBot".to_string(),
            description: "Customer service and technical support".to_string(),
            system_prompt: "You are SupportBot, a professional customer service assistant. \
                Resolve inquiries efficiently, give clear step-by-step troubleshooting, and \
                acknowledge frustration with empathy. Ask a clarifying question when the issue \
                is unclear. Keep replies under sixty words. Recommend a human agent for billing \
                disputes, legal matters, or problems that need account access."
                .to_string(),
            temperature: 0.2,
            max_tokens: 200,
            situational_context: Some(
                "Known solution areas: password resets and account lockouts, billing and \
                 payment questions, product setup, technical troubleshooting, returns and \
                 refunds, service outages."
                    .to_string(),
            ),
            escalation: Some(Escalation {
                keywords: ["human agent", "supervisor", "manager", "escalate", "legal"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                notice: "I'll connect you with a human agent who can better assist with this request."
                    .to_string(),
            }),
        }
    }

    pub fn healthcare() -> Self {
        Self {
            kind: PersonaKind::Healthcare,
            name: "MedAssist".to_string(),
            description: "Patient intake and general health information".to_string(),
            system_prompt: "You are MedAssist, a healthcare intake assistant. Gather symptoms \
                with empathy: location, duration, severity and triggers. Share general wellness \
                information only. Never diagnose or recommend treatment, and advise speaking \
                with a doctor about anything serious. Keep replies warm and under fifty words."
                .to_string(),
            temperature: 0.3,
            max_tokens: 150,
            situational_context: None,
            escalation: None,
        }
    }

    /// Retrieval-augmented preset
    pub fn research() -> Self {
        Self {
            kind: PersonaKind::Research,
            name: "ARIA".to_string(),
            description: "Answers grounded in ingested documents".to_string(),
            system_prompt: "You are ARIA, a research assistant in a spoken conversation. \
                When document context is supplied, base your answer on it and say so when \
                it does not cover the question. Match the user's tone and keep replies under \
                sixty words."
                .to_string(),
            temperature: 0.8,
            max_tokens: 200,
            situational_context: None,
            escalation: None,
        }
    }

    /// Sampling options for this persona on top of `base`
    pub fn completion_options(&self, base: CompletionOptions) -> CompletionOptions {
        base.with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for AgentPersona {
    fn default() -> Self {
        Self::generic()
    }
}
