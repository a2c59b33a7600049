//! Conversation records produced by the turn orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-stage timing for one turn, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyBreakdown {
    /// Turn start to end of capture (0 when no end signal was seen)
    pub capture_ms: u64,
    pub reasoning_ms: u64,
    /// Synthesis request to synthesis end
    pub synthesis_ms: u64,
    /// Turn start to synthesis end
    pub total_ms: u64,
}

/// A completed turn. Never mutated after it enters history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub agent_response: String,
    pub latency: LatencyBreakdown,
}

impl ConversationTurn {
    /// Allocate a fresh turn identifier
    pub fn new_id() -> String {
        format!("turn_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Mean latency per stage across a set of turns
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyAverages {
    pub capture_ms: f64,
    pub reasoning_ms: f64,
    pub synthesis_ms: f64,
    pub total_ms: f64,
    pub turns: usize,
}

impl LatencyAverages {
    /// Arithmetic mean of each stage. `None` for an empty history.
    pub fn from_turns(turns: &[ConversationTurn]) -> Option<Self> {
        if turns.is_empty() {
            return None;
        }

        let n = turns.len() as f64;
        let sum = |f: fn(&LatencyBreakdown) -> u64| -> f64 {
            turns.iter().map(|t| f(&t.latency) as f64).sum::<f64>() / n
        };

        Some(Self {
            capture_ms: sum(|l| l.capture_ms),
            reasoning_ms: sum(|l| l.reasoning_ms),
            synthesis_ms: sum(|l| l.synthesis_ms),
            total_ms: sum(|l| l.total_ms),
            turns: turns.len(),
        })
    }
}
