//! Centralized default values
//!
//! Single source of truth for defaults shared between the settings layer and
//! the crates that construct runtime configs from it.

/// Reasoning endpoint defaults
pub mod llm {
    pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";
    pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_TOP_P: f32 = 0.9;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_REFERER: &str = "http://localhost";
    pub const DEFAULT_TITLE: &str = "Voice Agent Framework";
}

/// Capture restart timing
pub mod capture {
    /// Delay before restarting a stream that ended on its own
    pub const RESTART_DELAY_MS: u64 = 100;
    /// Delay before the second restart attempt after a failed one
    pub const RETRY_DELAY_MS: u64 = 200;
    /// Delay before retrying a failed explicit start
    pub const START_RETRY_DELAY_MS: u64 = 100;
    pub const DEFAULT_LANGUAGE: &str = "en-US";
    pub const SILENCE_TIMEOUT_MS: u64 = 8_000;
}

/// Retrieval defaults
pub mod retrieval {
    pub const CHUNK_SIZE: usize = 500;
    pub const MAX_RESULTS: usize = 3;
}

/// Agent defaults
pub mod agent {
    /// Prior turns included in each prompt
    pub const HISTORY_WINDOW: usize = 10;
}
