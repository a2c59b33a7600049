//! Speech capability providers
//!
//! Capture and synthesis are opaque platform services. They accept
//! synchronous requests (`start`, `speak`) and report their lifecycle later
//! through a bound [`SignalSink`]. Nothing here assumes ordering between a
//! capture stream's end signal and its last result.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Callback through which a provider reports lifecycle signals
pub struct SignalSink<S> {
    inner: Arc<dyn Fn(S) + Send + Sync>,
}

impl<S> SignalSink<S> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(S) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// A sink that discards every signal
    pub fn detached() -> Self
    where
        S: 'static,
    {
        Self::new(|_| {})
    }

    pub fn emit(&self, signal: S) {
        (self.inner)(signal)
    }
}

impl<S> Clone for SignalSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for SignalSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink").finish_non_exhaustive()
    }
}

/// One recognized segment of a result batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionSegment {
    pub text: String,
    pub is_final: bool,
}

impl RecognitionSegment {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Lifecycle signals of a capture stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSignal {
    Started,
    /// The stream stopped, requested or not
    Ended,
    Results(Vec<RecognitionSegment>),
    NoMatch,
    Error(String),
}

/// Continuous speech capture
///
/// Implementations:
/// - `ScriptedCapture` - deterministic test double
/// - `ConsoleCapture` - stdin-backed provider used by the CLI
pub trait CaptureProvider: Send + Sync + 'static {
    /// Attach the sink that receives lifecycle signals
    fn bind(&self, sink: SignalSink<CaptureSignal>);

    /// Request the stream to start. An `Err` is a synchronous start failure.
    fn start(&self) -> Result<()>;

    /// Request the stream to stop. `Ended` follows asynchronously.
    fn stop(&self) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Voice parameters handed to a synthesis provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl SpeechParams {
    /// Set rate (clamped to 0.1 - 10.0)
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate.clamp(0.1, 10.0);
        self
    }

    /// Set pitch (clamped to 0.0 - 2.0)
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(0.0, 2.0);
        self
    }

    /// Set volume (clamped to 0.0 - 1.0)
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Lifecycle signals of a synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisSignal {
    Started,
    Ended,
    Error(String),
}

/// Speech synthesis
pub trait SynthesisProvider: Send + Sync + 'static {
    fn bind(&self, sink: SignalSink<SynthesisSignal>);

    /// Queue text for playback. Completion is reported via `Ended`.
    fn speak(&self, text: &str, params: &SpeechParams) -> Result<()>;

    /// Abort any playback in progress
    fn cancel(&self);

    fn is_speaking(&self) -> bool;

    fn name(&self) -> &str;
}
