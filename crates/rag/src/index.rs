//! Lexical retrieval index
//!
//! Append-only store of fragments. A fragment's score for a query is the
//! number of (query token, fragment token) pairs where either token contains
//! the other, divided by the number of query tokens. Tokens are lowercased
//! and split on whitespace. Only positive scores are returned, ordered by
//! descending score with ties kept in insertion order.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::chunker::{ChunkConfig, SentenceChunker};
use crate::RagError;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Metadata keys owned by the index; caller values under these names are dropped
const RESERVED_KEYS: [&str; 3] = ["document_id", "chunk_index", "total_chunks"];

/// Where a fragment came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Caller-supplied document metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unit of retrieval. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub content: String,
    pub metadata: FragmentMetadata,
}

/// Ranked query output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub fragments: Vec<Fragment>,
    /// Parallel to `fragments`
    pub scores: Vec<f32>,
    /// Fragment contents joined by blank lines
    pub context: String,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub fragment_count: usize,
}

struct Entry {
    fragment: Fragment,
    tokens: Vec<String>,
}

#[derive(Default)]
struct IndexState {
    entries: Vec<Entry>,
    documents: Vec<String>,
}

/// Shared retrieval index
pub struct RetrievalIndex {
    chunker: SentenceChunker,
    state: RwLock<IndexState>,
}

impl RetrievalIndex {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            chunker: SentenceChunker::new(config),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Split content into fragments and append them. Returns the document id.
    pub fn ingest(&self, content: &str, mut metadata: Map<String, Value>) -> Result<String, RagError> {
        if content.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }

        for key in RESERVED_KEYS {
            if metadata.remove(key).is_some() {
                tracing::debug!(key, "Ignoring reserved metadata key");
            }
        }

        let document_id = format!("doc_{}", uuid::Uuid::new_v4().simple());
        let chunks = self.chunker.chunk(content);
        let total_chunks = chunks.len();

        let entries: Vec<Entry> = chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Entry {
                tokens: tokenize(&text),
                fragment: Fragment {
                    id: format!("{}_chunk_{}", document_id, chunk_index),
                    content: text,
                    metadata: FragmentMetadata {
                        document_id: document_id.clone(),
                        chunk_index,
                        total_chunks,
                        extra: metadata.clone(),
                    },
                },
            })
            .collect();

        let mut state = self.state.write();
        state.entries.extend(entries);
        state.documents.push(document_id.clone());
        drop(state);

        tracing::info!(
            document_id = %document_id,
            fragments = total_chunks,
            "Document indexed"
        );

        Ok(document_id)
    }

    /// Rank fragments against a query
    pub fn query(&self, text: &str, max_results: usize) -> QueryResult {
        let query_tokens = tokenize(text);
        if query_tokens.is_empty() || max_results == 0 {
            return QueryResult::default();
        }

        let state = self.state.read();
        let mut scored: Vec<(f32, &Entry)> = state
            .entries
            .iter()
            .map(|entry| (overlap_score(&query_tokens, &entry.tokens), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(max_results);

        let fragments: Vec<Fragment> = scored.iter().map(|(_, e)| e.fragment.clone()).collect();
        let scores = scored.iter().map(|(s, _)| *s).collect();
        let context = fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        tracing::debug!(query = %text, results = fragments.len(), "Index queried");

        QueryResult {
            fragments,
            scores,
            context,
        }
    }

    /// Fragments of one document in chunk order
    pub fn document_fragments(&self, document_id: &str) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = self
            .state
            .read()
            .entries
            .iter()
            .filter(|e| e.fragment.metadata.document_id == document_id)
            .map(|e| e.fragment.clone())
            .collect();
        fragments.sort_by_key(|f| f.metadata.chunk_index);
        fragments
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            document_count: state.documents.len(),
            fragment_count: state.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Remove every document and fragment
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.documents.clear();
        drop(state);
        tracing::info!("Index cleared");
    }
}

impl Default for RetrievalIndex {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn overlap_score(query: &[String], fragment: &[String]) -> f32 {
    let matches = query
        .iter()
        .flat_map(|q| fragment.iter().map(move |f| (q, f)))
        .filter(|(q, f)| f.contains(q.as_str()) || q.contains(f.as_str()))
        .count();
    matches as f32 / query.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(name: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("source".to_string(), json!(name));
        m
    }

    #[test]
    fn test_single_sentence_single_fragment() {
        let index = RetrievalIndex::default();
        let doc_id = index.ingest("The sky is blue.", meta("sky")).unwrap();

        let fragments = index.document_fragments(&doc_id);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].id, format!("{}_chunk_0", doc_id));
        assert_eq!(fragments[0].metadata.total_chunks, 1);
        assert_eq!(fragments[0].metadata.extra["source"], "sky");
    }

    #[test]
    fn test_reserved_metadata_keys_are_overridden() {
        let index = RetrievalIndex::default();
        let mut metadata = meta("notes");
        metadata.insert("document_id".to_string(), json!("mine"));
        metadata.insert("chunk_index".to_string(), json!(7));
        metadata.insert("total_chunks".to_string(), json!(9));
        let doc_id = index.ingest("The sky is blue.", metadata).unwrap();

        let fragment = &index.document_fragments(&doc_id)[0];
        assert_eq!(fragment.metadata.document_id, doc_id);
        assert_eq!(fragment.metadata.extra.len(), 1);

        let value = serde_json::to_value(&fragment.metadata).unwrap();
        assert_eq!(
            value,
            json!({
                "document_id": doc_id,
                "chunk_index": 0,
                "total_chunks": 1,
                "source": "notes",
            })
        );
    }

    #[test]
    fn test_multi_fragment_recovers_source() {
        let index = RetrievalIndex::new(ChunkConfig { chunk_size: 30 });
        let content = "Rust has ownership. Borrowing is checked at compile time. \
                       Lifetimes describe scopes! Traits define shared behaviour?";
        let doc_id = index.ingest(content, Map::new()).unwrap();

        let fragments = index.document_fragments(&doc_id);
        assert!(fragments.len() > 1);
        for (i, f) in fragments.iter().enumerate() {
            assert_eq!(f.metadata.chunk_index, i);
            assert_eq!(f.metadata.total_chunks, fragments.len());
        }

        let rejoined = fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join(". ");
        assert_eq!(rejoined, SentenceChunker::split_sentences(content).join(". "));
    }

    #[test]
    fn test_query_scores_overlap() {
        let index = RetrievalIndex::default();
        index.ingest("The sky is blue. Water is wet.", Map::new()).unwrap();

        let result = index.query("blue sky", 5);
        assert_eq!(result.fragments.len(), 1);
        assert!(result.scores[0] > 0.0);
        assert_eq!(result.context, "The sky is blue. Water is wet");
    }

    #[test]
    fn test_query_without_overlap_is_empty() {
        let index = RetrievalIndex::default();
        index.ingest("The sky is blue. Water is wet.", Map::new()).unwrap();

        let result = index.query("xyz", 5);
        assert!(result.fragments.is_empty());
        assert!(result.scores.is_empty());
        assert_eq!(result.context, "");
    }

    #[test]
    fn test_ranking_and_ties() {
        let index = RetrievalIndex::new(ChunkConfig { chunk_size: 10 });
        index
            .ingest("cats purr. dogs bark loudly. cats and dogs play", Map::new())
            .unwrap();

        let result = index.query("dogs", 5);
        let contents: Vec<_> = result.fragments.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, vec!["dogs bark loudly", "cats and dogs play"]);
        assert_eq!(result.scores, vec![1.0, 1.0]);
        assert_eq!(result.context, "dogs bark loudly\n\ncats and dogs play");

        let result = index.query("cats purr", 1);
        assert_eq!(result.fragments.len(), 1);
        assert_eq!(result.fragments[0].content, "cats purr");
        assert!((result.scores[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_blank_query_and_zero_limit() {
        let index = RetrievalIndex::default();
        index.ingest("Something here.", Map::new()).unwrap();

        assert!(index.query("   ", 5).is_empty());
        assert!(index.query("something", 0).is_empty());
    }

    #[test]
    fn test_empty_document_rejected() {
        let index = RetrievalIndex::default();
        assert!(matches!(
            index.ingest("  \n ", Map::new()),
            Err(RagError::EmptyDocument)
        ));
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn test_stats_and_clear() {
        let index = RetrievalIndex::new(ChunkConfig { chunk_size: 10 });
        index.ingest("One sentence here. Another sentence.", Map::new()).unwrap();
        index.ingest("Single.", Map::new()).unwrap();

        let stats = index.stats();
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.fragment_count, 3);

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.stats(), IndexStats::default());
    }
}
