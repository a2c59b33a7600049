//! Scripted capability providers
//!
//! Deterministic stand-ins for platform capture and synthesis. Signals are
//! delivered synchronously on the calling thread, so a test controls the
//! exact interleaving of lifecycle events.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use voice_agent_core::{
    CaptureProvider, CaptureSignal, Error, RecognitionSegment, Result, SignalSink, SpeechParams,
    SynthesisProvider, SynthesisSignal,
};

/// Capture provider driven by the test
///
/// `start()` answers with `Started` and `stop()` with `Ended` unless a
/// start failure has been queued.
pub struct ScriptedCapture {
    sink: Mutex<SignalSink<CaptureSignal>>,
    failing_starts: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(SignalSink::detached()),
            failing_starts: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` calls to `start()` fail
    pub fn fail_next_starts(&self, count: usize) {
        self.failing_starts.store(count, Ordering::SeqCst);
    }

    /// Deliver a raw signal
    pub fn emit(&self, signal: CaptureSignal) {
        let sink = self.sink.lock().clone();
        sink.emit(signal);
    }

    /// Deliver a final recognition result
    pub fn say(&self, text: &str) {
        self.emit(CaptureSignal::Results(vec![RecognitionSegment::final_text(
            text,
        )]));
    }

    /// Deliver an interim recognition result
    pub fn interim(&self, text: &str) {
        self.emit(CaptureSignal::Results(vec![RecognitionSegment::interim(text)]));
    }

    /// Simulate the stream terminating on its own
    pub fn end_stream(&self) {
        self.emit(CaptureSignal::Ended);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for ScriptedCapture {
    fn bind(&self, sink: SignalSink<CaptureSignal>) {
        *self.sink.lock() = sink;
    }

    fn start(&self) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failing_starts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::Capture("Capture device unavailable".to_string()));
        }

        self.emit(CaptureSignal::Started);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(CaptureSignal::Ended);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Synthesis provider driven by the test
///
/// `speak()` records the text and answers with `Started`. Playback only
/// ends when the test calls [`finish`](Self::finish) or
/// [`fail_playback`](Self::fail_playback).
pub struct ScriptedSynthesis {
    sink: Mutex<SignalSink<SynthesisSignal>>,
    spoken: Mutex<Vec<String>>,
    fail_next_speak: AtomicBool,
    speaking: AtomicBool,
    cancel_calls: AtomicUsize,
}

impl ScriptedSynthesis {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(SignalSink::detached()),
            spoken: Mutex::new(Vec::new()),
            fail_next_speak: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Reject the next `speak()` synchronously
    pub fn fail_next_speak(&self) {
        self.fail_next_speak.store(true, Ordering::SeqCst);
    }

    /// Complete the current playback
    pub fn finish(&self) {
        self.speaking.store(false, Ordering::SeqCst);
        self.emit(SynthesisSignal::Ended);
    }

    /// Report a playback failure
    pub fn fail_playback(&self, detail: &str) {
        self.speaking.store(false, Ordering::SeqCst);
        self.emit(SynthesisSignal::Error(detail.to_string()));
    }

    /// Every text passed to `speak()`, in order
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn emit(&self, signal: SynthesisSignal) {
        let sink = self.sink.lock().clone();
        sink.emit(signal);
    }
}

impl Default for ScriptedSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisProvider for ScriptedSynthesis {
    fn bind(&self, sink: SignalSink<SynthesisSignal>) {
        *self.sink.lock() = sink;
    }

    fn speak(&self, text: &str, _params: &SpeechParams) -> Result<()> {
        self.spoken.lock().push(text.to_string());

        if self.fail_next_speak.swap(false, Ordering::SeqCst) {
            return Err(Error::Synthesis("Synthesis engine rejected the request".to_string()));
        }

        self.speaking.store(true, Ordering::SeqCst);
        self.emit(SynthesisSignal::Started);
        Ok(())
    }

    fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
