//! Capture Stream Controller
//!
//! Turns an unreliable capture provider into a continuous stream. The
//! caller's intent ("keep capturing") is tracked separately from the
//! stream's own lifecycle. When the stream ends while intent holds, a
//! restart is scheduled after a short delay; a failed restart is retried
//! once after a longer delay before a fatal error is published.
//!
//! State machine:
//!
//! ```text
//! Idle ──start()──► Starting ──Started──► Active ──Ended──► Idle
//!   ▲                                                        │
//!   └──────────── restart timer (intent still set) ◄─────────┘
//! ```
//!
//! At most one restart is in flight at any time. `stop()` bumps a
//! generation counter so timers scheduled before it become no-ops.
//!
//! Providers may signal from their own threads. Restart timers run on the
//! runtime the controller was created on; with no runtime at all, a restart
//! cannot be scheduled and the controller gives up with a fatal error.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;

use voice_agent_config::CaptureSettings;
use voice_agent_core::{
    BusEvent, CaptureProvider, CaptureSignal, Error, EventBus, RecognitionSegment, SignalSink,
};

/// Restart timing
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Delay before restarting a stream that ended on its own
    pub restart_delay: Duration,
    /// Delay before the second restart attempt
    pub retry_delay: Duration,
    /// Delay before retrying a failed explicit start
    pub start_retry_delay: Duration,
    /// Publish interim recognition text
    pub interim_results: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_settings(&CaptureSettings::default())
    }
}

impl CaptureConfig {
    pub fn from_settings(settings: &CaptureSettings) -> Self {
        Self {
            restart_delay: Duration::from_millis(settings.restart_delay_ms),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            start_retry_delay: Duration::from_millis(settings.start_retry_delay_ms),
            interim_results: settings.interim_results,
        }
    }
}

/// Stream lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Active,
}

/// Events published by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    Ended,
    FinalTranscript(String),
    PartialTranscript(String),
    /// `fatal` means the controller gave up and returned to `Idle`
    Error { error: Error, fatal: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureEventKind {
    Started,
    Ended,
    FinalTranscript,
    PartialTranscript,
    Error,
}

impl BusEvent for CaptureEvent {
    type Kind = CaptureEventKind;

    fn kind(&self) -> CaptureEventKind {
        match self {
            CaptureEvent::Started => CaptureEventKind::Started,
            CaptureEvent::Ended => CaptureEventKind::Ended,
            CaptureEvent::FinalTranscript(_) => CaptureEventKind::FinalTranscript,
            CaptureEvent::PartialTranscript(_) => CaptureEventKind::PartialTranscript,
            CaptureEvent::Error { .. } => CaptureEventKind::Error,
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    state: CaptureState,
    /// Caller wants continuous capture
    keep_capturing: bool,
    restart_in_flight: bool,
    generation: u64,
}

/// Capture stream controller
pub struct CaptureController {
    provider: Arc<dyn CaptureProvider>,
    config: CaptureConfig,
    control: Mutex<ControlState>,
    events: EventBus<CaptureEvent>,
    restarts_scheduled: AtomicU64,
    /// Runtime current at construction, used for signals from foreign threads
    runtime: Option<Handle>,
}

impl CaptureController {
    /// Create a controller and bind it to the provider's signals
    pub fn new(provider: Arc<dyn CaptureProvider>, config: CaptureConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            provider.bind(SignalSink::new(move |signal| {
                if let Some(controller) = weak.upgrade() {
                    let _runtime = controller.runtime.as_ref().map(Handle::enter);
                    controller.handle_signal(signal);
                }
            }));

            Self {
                provider,
                config,
                control: Mutex::new(ControlState::default()),
                events: EventBus::new(),
                restarts_scheduled: AtomicU64::new(0),
                runtime: Handle::try_current().ok(),
            }
        })
    }

    /// Event bus for capture events
    pub fn events(&self) -> &EventBus<CaptureEvent> {
        &self.events
    }

    pub fn state(&self) -> CaptureState {
        self.control.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == CaptureState::Active
    }

    /// Whether the caller asked for continuous capture
    pub fn wants_capture(&self) -> bool {
        self.control.lock().keep_capturing
    }

    pub fn restart_in_flight(&self) -> bool {
        self.control.lock().restart_in_flight
    }

    /// Number of automatic restarts scheduled since creation
    pub fn restarts_scheduled(&self) -> u64 {
        self.restarts_scheduled.load(Ordering::Relaxed)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Begin continuous capture
    ///
    /// No-op while the stream is starting, active, or a restart is pending.
    /// A synchronous start failure is retried once after
    /// `start_retry_delay`.
    pub fn start(self: &Arc<Self>) {
        let generation = {
            let mut control = self.control.lock();
            control.keep_capturing = true;
            if control.state != CaptureState::Idle || control.restart_in_flight {
                tracing::debug!(state = ?control.state, "Capture already running");
                return;
            }
            control.state = CaptureState::Starting;
            control.generation
        };

        tracing::info!(provider = self.provider.name(), "Starting capture");
        self.attempt_start(generation, 1, self.config.start_retry_delay);
    }

    /// Stop capture and cancel pending restarts
    pub fn stop(&self) {
        let running = {
            let mut control = self.control.lock();
            control.keep_capturing = false;
            control.restart_in_flight = false;
            control.generation += 1;
            matches!(control.state, CaptureState::Active | CaptureState::Starting)
        };

        if running {
            tracing::info!(provider = self.provider.name(), "Stopping capture");
            if let Err(e) = self.provider.stop() {
                tracing::warn!(error = %e, "Capture provider failed to stop");
                self.events.publish(&CaptureEvent::Error {
                    error: e,
                    fatal: false,
                });
            }
        }
    }

    fn attempt_start(self: &Arc<Self>, generation: u64, retries_left: u8, retry_delay: Duration) {
        let result = self.provider.start();

        let mut control = self.control.lock();
        if control.generation != generation {
            // stop() ran while the provider call was in progress
            return;
        }

        let error = match result {
            Ok(()) => {
                control.restart_in_flight = false;
                return;
            }
            Err(e) => e,
        };

        if control.state == CaptureState::Starting {
            control.state = CaptureState::Idle;
        }

        if retries_left > 0 && control.keep_capturing {
            control.restart_in_flight = true;
            drop(control);
            tracing::warn!(
                error = %error,
                retry_in_ms = retry_delay.as_millis() as u64,
                "Capture start failed, retrying"
            );
            self.schedule_start(retry_delay, generation, retries_left - 1);
            return;
        }

        control.restart_in_flight = false;
        control.keep_capturing = false;
        drop(control);

        tracing::error!(error = %error, "Capture could not be started");
        self.events.publish(&CaptureEvent::Error {
            error,
            fatal: true,
        });
    }

    fn schedule_start(self: &Arc<Self>, delay: Duration, generation: u64, retries_left: u8) {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            self.abandon_restart(generation);
            return;
        };

        let weak = Arc::downgrade(self);
        let deadline = {
            let _clock = runtime.enter();
            tokio::time::Instant::now() + delay
        };

        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let Some(this) = weak.upgrade() else {
                return;
            };

            {
                let mut control = this.control.lock();
                if control.generation != generation {
                    return;
                }
                if !control.keep_capturing || control.state != CaptureState::Idle {
                    control.restart_in_flight = false;
                    return;
                }
                control.state = CaptureState::Starting;
            }

            let retry_delay = this.config.retry_delay;
            this.attempt_start(generation, retries_left, retry_delay);
        });
    }

    /// Give up on a pending restart that has no runtime to run on
    fn abandon_restart(&self, generation: u64) {
        {
            let mut control = self.control.lock();
            if control.generation != generation {
                return;
            }
            control.restart_in_flight = false;
            control.keep_capturing = false;
        }

        tracing::error!("No async runtime to schedule a capture restart");
        self.events.publish(&CaptureEvent::Error {
            error: Error::Capture("No async runtime available to restart capture".to_string()),
            fatal: true,
        });
    }

    fn handle_signal(self: &Arc<Self>, signal: CaptureSignal) {
        match signal {
            CaptureSignal::Started => {
                {
                    let mut control = self.control.lock();
                    control.state = CaptureState::Active;
                    control.restart_in_flight = false;
                }
                tracing::debug!("Capture stream started");
                self.events.publish(&CaptureEvent::Started);
            }
            CaptureSignal::Ended => self.on_stream_ended(),
            CaptureSignal::Results(segments) => self.on_results(&segments),
            CaptureSignal::NoMatch => {
                self.events.publish(&CaptureEvent::Error {
                    error: Error::Capture("No speech was recognized".to_string()),
                    fatal: false,
                });
            }
            CaptureSignal::Error(detail) => {
                tracing::warn!(error = %detail, "Capture provider error");
                self.events.publish(&CaptureEvent::Error {
                    error: Error::Capture(format!("Speech recognition error: {}", detail)),
                    fatal: false,
                });
            }
        }
    }

    fn on_stream_ended(self: &Arc<Self>) {
        let restart = {
            let mut control = self.control.lock();
            control.state = CaptureState::Idle;
            if control.keep_capturing && !control.restart_in_flight {
                control.restart_in_flight = true;
                Some(control.generation)
            } else {
                None
            }
        };

        tracing::debug!(restart = restart.is_some(), "Capture stream ended");
        self.events.publish(&CaptureEvent::Ended);

        if let Some(generation) = restart {
            self.restarts_scheduled.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                delay_ms = self.config.restart_delay.as_millis() as u64,
                "Scheduling capture restart"
            );
            self.schedule_start(self.config.restart_delay, generation, 1);
        }
    }

    fn on_results(&self, segments: &[RecognitionSegment]) {
        let mut final_text = String::new();
        let mut interim_text = String::new();
        for segment in segments {
            if segment.is_final {
                final_text.push_str(&segment.text);
            } else {
                interim_text.push_str(&segment.text);
            }
        }

        let final_text = final_text.trim();
        if !final_text.is_empty() {
            self.events
                .publish(&CaptureEvent::FinalTranscript(final_text.to_string()));
        }

        let interim_text = interim_text.trim();
        if self.config.interim_results && !interim_text.is_empty() {
            self.events
                .publish(&CaptureEvent::PartialTranscript(interim_text.to_string()));
        }
    }
}
