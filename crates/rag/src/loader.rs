//! Document loading
//!
//! Reads text-like files into indexable content. JSON is pretty-printed and
//! CSV gets a short header summary so the index sees column names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::RagError;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern is valid"));

/// Supported file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Markdown,
    Json,
    Csv,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// A loaded, normalized document ready for ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedDocument {
    pub file_name: String,
    pub kind: DocumentKind,
    pub content: String,
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
}

impl LoadedDocument {
    /// Build from raw file text
    pub fn from_raw(file_name: impl Into<String>, kind: DocumentKind, raw: &str) -> Self {
        let content = match kind {
            DocumentKind::Text | DocumentKind::Markdown => raw.to_string(),
            DocumentKind::Json => pretty_json(raw),
            DocumentKind::Csv => describe_csv(raw),
        };

        Self {
            file_name: file_name.into(),
            kind,
            word_count: content.split_whitespace().count(),
            character_count: content.chars().count(),
            line_count: content.lines().count(),
            content,
        }
    }

    /// Metadata attached to every fragment of this document
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("file_name".to_string(), json!(self.file_name));
        map.insert("kind".to_string(), json!(self.kind.as_str()));
        map.insert("word_count".to_string(), json!(self.word_count));
        map.insert("character_count".to_string(), json!(self.character_count));
        map.insert("line_count".to_string(), json!(self.line_count));
        map
    }

    /// Short human-readable description
    pub fn summary(&self) -> String {
        if self.word_count < 50 {
            return format!(
                "This is a short {} file with {} words.",
                self.kind.as_str(),
                self.word_count
            );
        }

        format!(
            "This {} file contains {} words across {} lines. Key topics include: {}.",
            self.kind.as_str(),
            self.word_count,
            self.line_count,
            self.key_topics(5).join(", ")
        )
    }

    /// Most frequent words longer than four characters
    pub fn key_topics(&self, limit: usize) -> Vec<String> {
        let normalized = NON_WORD.replace_all(&self.content, " ").to_lowercase();

        let mut order: Vec<&str> = Vec::new();
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for word in normalized.split_whitespace().filter(|w| w.chars().count() > 4) {
            let count = frequency.entry(word).or_insert(0);
            if *count == 0 {
                order.push(word);
            }
            *count += 1;
        }

        // Stable sort keeps first-seen order among equal counts
        order.sort_by(|a, b| frequency[b].cmp(&frequency[a]));
        order.into_iter().take(limit).map(str::to_string).collect()
    }
}

/// File loader
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a file by extension
    pub fn load(path: &Path) -> Result<LoadedDocument, RagError> {
        let kind = DocumentKind::from_path(path)
            .ok_or_else(|| RagError::UnsupportedFormat(path.display().to_string()))?;

        let raw = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let doc = LoadedDocument::from_raw(file_name, kind, &raw);
        tracing::info!(
            file = %path.display(),
            kind = doc.kind.as_str(),
            words = doc.word_count,
            "Document loaded"
        );
        Ok(doc)
    }
}

fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn describe_csv(raw: &str) -> String {
    let rows = raw.lines().count();
    let headers: Vec<&str> = raw
        .lines()
        .next()
        .map(|h| h.split(',').map(str::trim).collect())
        .unwrap_or_default();

    format!(
        "CSV File with {} rows and {} columns:\nHeaders: {}\n\nContent:\n{}",
        rows,
        headers.len(),
        headers.join(", "),
        raw
    )
}
