//! Console capability providers
//!
//! Stand-ins for platform speech services when running in a terminal.
//! Typed lines are treated as recognized speech and replies are printed
//! with a simulated playback duration.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use voice_agent_core::{
    CaptureProvider, CaptureSignal, Error, RecognitionSegment, Result, SignalSink, SpeechParams,
    SynthesisProvider, SynthesisSignal,
};

/// Average speaking rate at `rate == 1.0`
const WORDS_PER_MINUTE: f32 = 180.0;

struct CaptureShared {
    sink: Mutex<SignalSink<CaptureSignal>>,
    active: AtomicBool,
    last_activity: Mutex<Instant>,
    /// Bumped on every start/stop so stale watchdogs exit
    generation: AtomicU64,
}

impl CaptureShared {
    fn emit(&self, signal: CaptureSignal) {
        let sink = self.sink.lock().clone();
        sink.emit(signal);
    }
}

/// Stdin-fed capture stream
///
/// Like a platform recognizer, the stream ends by itself after a period of
/// silence; the capture controller is expected to restart it.
pub struct ConsoleCapture {
    shared: Arc<CaptureShared>,
    silence_timeout: Duration,
}

impl ConsoleCapture {
    pub fn new(silence_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(CaptureShared {
                sink: Mutex::new(SignalSink::detached()),
                active: AtomicBool::new(false),
                last_activity: Mutex::new(Instant::now()),
                generation: AtomicU64::new(0),
            }),
            silence_timeout,
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Deliver a typed line as a final transcript
    ///
    /// Returns false when the stream is not running and the line was dropped.
    pub fn push_line(&self, text: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        *self.shared.last_activity.lock() = Instant::now();
        self.shared
            .emit(CaptureSignal::Results(vec![RecognitionSegment::final_text(text)]));
        true
    }

    fn spawn_watchdog(&self, runtime: tokio::runtime::Handle, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let timeout = self.silence_timeout;

        runtime.spawn(async move {
            loop {
                let deadline = *shared.last_activity.lock() + timeout;
                tokio::time::sleep_until(deadline).await;

                if shared.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if Instant::now() < *shared.last_activity.lock() + timeout {
                    continue;
                }
                if shared.active.swap(false, Ordering::SeqCst) {
                    tracing::debug!("Console capture ended after silence");
                    shared.emit(CaptureSignal::Ended);
                }
                return;
            }
        });
    }
}

impl CaptureProvider for ConsoleCapture {
    fn bind(&self, sink: SignalSink<CaptureSignal>) {
        *self.shared.sink.lock() = sink;
    }

    fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Capture(format!("No async runtime: {}", e)))?;

        if self.shared.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.last_activity.lock() = Instant::now();
        self.shared.emit(CaptureSignal::Started);
        self.spawn_watchdog(runtime, generation);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if self.shared.active.swap(false, Ordering::SeqCst) {
            self.shared.emit(CaptureSignal::Ended);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

struct SynthesisShared {
    sink: Mutex<SignalSink<SynthesisSignal>>,
    speaking: AtomicBool,
    generation: AtomicU64,
}

impl SynthesisShared {
    fn emit(&self, signal: SynthesisSignal) {
        let sink = self.sink.lock().clone();
        sink.emit(signal);
    }
}

/// Prints replies and simulates playback time
pub struct ConsoleSynthesis {
    shared: Arc<SynthesisShared>,
}

impl ConsoleSynthesis {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SynthesisShared {
                sink: Mutex::new(SignalSink::detached()),
                speaking: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for ConsoleSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated time to speak `text` at `rate`
pub fn playback_duration(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count() as f32;
    let words_per_second = WORDS_PER_MINUTE / 60.0 * rate.max(0.1);
    Duration::from_secs_f32(words / words_per_second)
}

impl SynthesisProvider for ConsoleSynthesis {
    fn bind(&self, sink: SignalSink<SynthesisSignal>) {
        *self.shared.sink.lock() = sink;
    }

    fn speak(&self, text: &str, params: &SpeechParams) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Synthesis(format!("No async runtime: {}", e)))?;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let duration = playback_duration(text, params.rate);

        println!("\n< {}\n", text);
        self.shared.speaking.store(true, Ordering::SeqCst);
        self.shared.emit(SynthesisSignal::Started);

        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            if shared.generation.load(Ordering::SeqCst) == generation
                && shared.speaking.swap(false, Ordering::SeqCst)
            {
                shared.emit(SynthesisSignal::Ended);
            }
        });
        Ok(())
    }

    fn cancel(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "console"
    }
}
