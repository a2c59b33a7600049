//! Server-sent event decoding for streamed completions
//!
//! The transport delivers arbitrary byte chunks; lines may be split across
//! chunks (including inside a multi-byte character). Only `data:` lines
//! carry payloads. Malformed JSON is skipped, and `data: [DONE]` ends the
//! stream.

use serde::Deserialize;

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder turning SSE bytes into content deltas
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a transport chunk, returning the deltas completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(delta) = self.decode_line(&line) {
                deltas.push(delta);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        deltas
    }

    /// Flush a trailing line left without a newline when the transport closes
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        let delta = self.decode_line(&line);
        self.done = true;
        delta
    }

    /// True once the terminator was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        let payload = line.strip_prefix("data:")?.trim_start();
        if payload == DONE_SENTINEL {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)
                .filter(|c| !c.is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed stream line");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
