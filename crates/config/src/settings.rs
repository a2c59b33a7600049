//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{agent, capture, llm, retrieval};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Reasoning endpoint
    #[serde(default)]
    pub llm: LlmSettings,

    /// Capture stream behaviour
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Voice parameters
    #[serde(default)]
    pub synthesis: SynthesisSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_llm()?;
        self.validate_capture()?;
        self.validate_retrieval()?;

        if self.environment.is_production() && self.llm.api_key.is_none() {
            return Err(ConfigError::MissingField("llm.api_key".to_string()));
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !(llm.endpoint.starts_with("http://") || llm.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "llm.endpoint".to_string(),
                message: format!("Must be an http(s) URL, got '{}'", llm.endpoint),
            });
        }

        if llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }

        if llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", llm.temperature),
            });
        }

        if llm.top_p <= 0.0 || llm.top_p > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.top_p".to_string(),
                message: format!("Must be in (0.0, 1.0], got {}", llm.top_p),
            });
        }

        Ok(())
    }

    fn validate_capture(&self) -> Result<(), ConfigError> {
        let delays = [
            ("capture.restart_delay_ms", self.capture.restart_delay_ms),
            ("capture.retry_delay_ms", self.capture.retry_delay_ms),
            ("capture.start_retry_delay_ms", self.capture.start_retry_delay_ms),
        ];

        for (field, value) in delays {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be greater than 0 to avoid tight restart loops".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.chunk_size".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.retrieval.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.max_results".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Reasoning endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Sent as `HTTP-Referer`
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Sent as `X-Title`
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_endpoint() -> String {
    llm::DEFAULT_ENDPOINT.to_string()
}
fn default_model() -> String {
    llm::DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    llm::DEFAULT_MAX_TOKENS
}
fn default_temperature() -> f32 {
    llm::DEFAULT_TEMPERATURE
}
fn default_top_p() -> f32 {
    llm::DEFAULT_TOP_P
}
fn default_timeout_ms() -> u64 {
    llm::DEFAULT_TIMEOUT_MS
}
fn default_referer() -> String {
    llm::DEFAULT_REFERER.to_string()
}
fn default_title() -> String {
    llm::DEFAULT_TITLE.to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_ms: default_timeout_ms(),
            referer: default_referer(),
            title: default_title(),
        }
    }
}

/// Capture stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_start_retry_delay_ms")]
    pub start_retry_delay_ms: u64,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub interim_results: bool,

    /// Console provider only: inactivity before the stream ends itself
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
}

fn default_restart_delay_ms() -> u64 {
    capture::RESTART_DELAY_MS
}
fn default_retry_delay_ms() -> u64 {
    capture::RETRY_DELAY_MS
}
fn default_start_retry_delay_ms() -> u64 {
    capture::START_RETRY_DELAY_MS
}
fn default_language() -> String {
    capture::DEFAULT_LANGUAGE.to_string()
}
fn default_silence_timeout_ms() -> u64 {
    capture::SILENCE_TIMEOUT_MS
}
fn default_true() -> bool {
    true
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            start_retry_delay_ms: default_start_retry_delay_ms(),
            language: default_language(),
            interim_results: true,
            silence_timeout_ms: default_silence_timeout_ms(),
        }
    }
}

/// Voice parameters. Out-of-range values are clamped by the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSettings {
    #[serde(default = "default_unit")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
    #[serde(default = "default_unit")]
    pub volume: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Retrieval index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fragment size budget in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fragments injected into each prompt
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_chunk_size() -> usize {
    retrieval::CHUNK_SIZE
}
fn default_max_results() -> usize {
    retrieval::MAX_RESULTS
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: default_chunk_size(),
            max_results: default_max_results(),
        }
    }
}

/// Persona preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKind {
    #[default]
    Generic,
    CustomerSupport,
    Healthcare,
    /// Retrieval-augmented research assistant
    Research,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub persona: PersonaKind,

    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Reply used instead of surfacing a reasoning failure
    #[serde(default)]
    pub fallback_reply: Option<String>,
}

fn default_history_window() -> usize {
    agent::HISTORY_WINDOW
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            persona: PersonaKind::default(),
            history_window: default_history_window(),
            fallback_reply: None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOICE_AGENT__LLM__API_KEY` style)
/// 2. config/{env}.{toml,yaml} (if env specified)
/// 3. config/default.{toml,yaml}
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings with an explicit config directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
