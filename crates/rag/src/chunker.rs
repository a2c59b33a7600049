//! Sentence chunking
//!
//! Content is split on runs of sentence terminators (`.`, `!`, `?`).
//! Sentences are accumulated into a fragment, joined with `". "`, until
//! adding the next one would exceed the character budget; the fragment is
//! then flushed. A trailing partial fragment is always emitted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use voice_agent_config::RetrievalSettings;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence boundary pattern is valid"));

const SENTENCE_JOINER: &str = ". ";

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Fragment budget in characters
    pub chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

impl ChunkConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
        }
    }
}

/// Sentence chunker
#[derive(Debug, Clone, Default)]
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Trimmed, non-empty sentences in source order
    pub fn split_sentences(content: &str) -> Vec<&str> {
        SENTENCE_BOUNDARY
            .split(content)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Split content into fragment texts
    pub fn chunk(&self, content: &str) -> Vec<String> {
        let sentences = Self::split_sentences(content);
        if sentences.is_empty() {
            let trimmed = content.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in sentences {
            let len = sentence.chars().count();

            if !current.is_empty() && current_len + len > self.config.chunk_size {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if !current.is_empty() {
                current.push_str(SENTENCE_JOINER);
                current_len += SENTENCE_JOINER.len();
            }
            current.push_str(sentence);
            current_len += len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}
