//! Turn Orchestrator
//!
//! Binds capture, reasoning and synthesis into one conversation turn.
//!
//! ```text
//! Idle ──capture started──► AwaitingInput ──final transcript──► Reasoning
//!   ▲                                                              │
//!   │                                             reply ready      ▼
//!   └──────────── synthesis ended (turn appended) ◄──────── Synthesizing
//!
//! Reasoning / Synthesizing ──failure──► Stalled ──new capture or reset──► ...
//! ```
//!
//! At most one turn is in progress. Every mutation of the turn slot and the
//! history happens under one lock; events are published after it is
//! released so handlers may call back into the orchestrator.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::capture::{CaptureController, CaptureEvent};
use crate::PipelineError;
use voice_agent_config::Settings;
use voice_agent_core::{
    BusEvent, ConversationTurn, Error, EventBus, LatencyAverages, LatencyBreakdown,
    ResponseGenerator, SignalSink, SpeechParams, SubscriptionId, SynthesisProvider,
    SynthesisSignal,
};

/// Orchestrator configuration
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Voice parameters for every reply
    pub speech: SpeechParams,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            speech: SpeechParams::default()
                .with_language(settings.capture.language.clone())
                .with_rate(settings.synthesis.rate)
                .with_pitch(settings.synthesis.pitch)
                .with_volume(settings.synthesis.volume),
        }
    }
}

/// Pipeline stage a latency or error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnStage {
    Capture,
    Reasoning,
    Synthesis,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Capture => "capture",
            TurnStage::Reasoning => "reasoning",
            TurnStage::Synthesis => "synthesis",
        }
    }
}

/// Turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingInput,
    Reasoning,
    Synthesizing,
    /// A reasoning or synthesis failure left the turn unfinished
    Stalled,
}

/// Events published by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TurnInputStarted {
        turn_id: String,
    },
    CaptureCompleted {
        turn_id: String,
        capture_ms: u64,
    },
    TranscriptReceived {
        turn_id: String,
        text: String,
    },
    PartialTranscript {
        text: String,
    },
    /// A final transcript arrived while another turn was still outstanding
    TranscriptIgnored {
        text: String,
    },
    ReasoningStarted {
        turn_id: String,
    },
    ReasoningCompleted {
        turn_id: String,
        response: String,
        reasoning_ms: u64,
    },
    SpeechOutputStarted {
        turn_id: String,
    },
    SpeechOutputEnded {
        turn_id: String,
    },
    TurnCompleted(ConversationTurn),
    TurnAbandoned {
        turn_id: String,
        state: TurnState,
    },
    HistoryCleared,
    Error {
        stage: TurnStage,
        turn_id: Option<String>,
        error: Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnEventKind {
    TurnInputStarted,
    CaptureCompleted,
    TranscriptReceived,
    PartialTranscript,
    TranscriptIgnored,
    ReasoningStarted,
    ReasoningCompleted,
    SpeechOutputStarted,
    SpeechOutputEnded,
    TurnCompleted,
    TurnAbandoned,
    HistoryCleared,
    Error,
}

impl BusEvent for TurnEvent {
    type Kind = TurnEventKind;

    fn kind(&self) -> TurnEventKind {
        match self {
            TurnEvent::TurnInputStarted { .. } => TurnEventKind::TurnInputStarted,
            TurnEvent::CaptureCompleted { .. } => TurnEventKind::CaptureCompleted,
            TurnEvent::TranscriptReceived { .. } => TurnEventKind::TranscriptReceived,
            TurnEvent::PartialTranscript { .. } => TurnEventKind::PartialTranscript,
            TurnEvent::TranscriptIgnored { .. } => TurnEventKind::TranscriptIgnored,
            TurnEvent::ReasoningStarted { .. } => TurnEventKind::ReasoningStarted,
            TurnEvent::ReasoningCompleted { .. } => TurnEventKind::ReasoningCompleted,
            TurnEvent::SpeechOutputStarted { .. } => TurnEventKind::SpeechOutputStarted,
            TurnEvent::SpeechOutputEnded { .. } => TurnEventKind::SpeechOutputEnded,
            TurnEvent::TurnCompleted(_) => TurnEventKind::TurnCompleted,
            TurnEvent::TurnAbandoned { .. } => TurnEventKind::TurnAbandoned,
            TurnEvent::HistoryCleared => TurnEventKind::HistoryCleared,
            TurnEvent::Error { .. } => TurnEventKind::Error,
        }
    }
}

/// The turn in progress
struct TurnSlot {
    id: String,
    state: TurnState,
    created_at: chrono::DateTime<Utc>,
    started_at: Instant,
    capture_ms: Option<u64>,
    reasoning_started_at: Option<Instant>,
    reasoning_ms: u64,
    synthesis_started_at: Option<Instant>,
    user_input: String,
    agent_response: String,
}

impl TurnSlot {
    fn new() -> Self {
        Self {
            id: ConversationTurn::new_id(),
            state: TurnState::AwaitingInput,
            created_at: Utc::now(),
            started_at: Instant::now(),
            capture_ms: None,
            reasoning_started_at: None,
            reasoning_ms: 0,
            synthesis_started_at: None,
            user_input: String::new(),
            agent_response: String::new(),
        }
    }

    /// Record capture time once; later signals do not overwrite it
    fn record_capture(&mut self) -> Option<u64> {
        if self.capture_ms.is_some() {
            return None;
        }
        let ms = elapsed_ms(self.started_at);
        self.capture_ms = Some(ms);
        Some(ms)
    }
}

#[derive(Default)]
struct Inner {
    slot: Option<TurnSlot>,
    history: Vec<ConversationTurn>,
    disposed: bool,
    capture_subscription: Option<SubscriptionId>,
}

impl Inner {
    /// Slot for a new input, replacing a stalled turn if there is one
    fn open_turn(&mut self, events: &mut Vec<TurnEvent>) {
        if let Some(stale) = self.slot.take() {
            tracing::info!(turn_id = %stale.id, state = ?stale.state, "Abandoning turn");
            events.push(TurnEvent::TurnAbandoned {
                turn_id: stale.id,
                state: stale.state,
            });
        }

        let slot = TurnSlot::new();
        tracing::debug!(turn_id = %slot.id, "Turn started");
        events.push(TurnEvent::TurnInputStarted {
            turn_id: slot.id.clone(),
        });
        self.slot = Some(slot);
    }

    fn current_state(&self) -> TurnState {
        self.slot.as_ref().map_or(TurnState::Idle, |s| s.state)
    }

    /// Close the slot and append the finished turn
    fn complete_turn(&mut self, synthesis_ms: u64, events: &mut Vec<TurnEvent>) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        let turn = ConversationTurn {
            id: slot.id,
            timestamp: slot.created_at,
            user_input: slot.user_input,
            agent_response: slot.agent_response,
            latency: LatencyBreakdown {
                capture_ms: slot.capture_ms.unwrap_or(0),
                reasoning_ms: slot.reasoning_ms,
                synthesis_ms,
                total_ms: elapsed_ms(slot.started_at),
            },
        };

        record_stage(TurnStage::Synthesis, synthesis_ms);
        metrics::histogram!("voice_agent_stage_latency_ms", "stage" => "total")
            .record(turn.latency.total_ms as f64);
        metrics::counter!("voice_agent_turns_completed_total").increment(1);

        tracing::info!(
            turn_id = %turn.id,
            capture_ms = turn.latency.capture_ms,
            reasoning_ms = turn.latency.reasoning_ms,
            synthesis_ms = turn.latency.synthesis_ms,
            total_ms = turn.latency.total_ms,
            "Turn completed"
        );

        self.history.push(turn.clone());
        events.push(TurnEvent::TurnCompleted(turn));
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn record_stage(stage: TurnStage, ms: u64) {
    metrics::histogram!("voice_agent_stage_latency_ms", "stage" => stage.as_str())
        .record(ms as f64);
}

fn stage_error(stage: TurnStage, turn_id: Option<String>, error: Error) -> TurnEvent {
    metrics::counter!(
        "voice_agent_turn_errors_total",
        "stage" => stage.as_str(),
        "kind" => error.kind()
    )
    .increment(1);
    TurnEvent::Error {
        stage,
        turn_id,
        error,
    }
}

/// Turn orchestrator
///
/// Reasoning runs on a spawned task, on the current runtime or else the one
/// the orchestrator was created on. Without either, a transcript stalls its
/// turn with a reasoning error.
pub struct TurnOrchestrator {
    capture: Arc<CaptureController>,
    synthesis: Arc<dyn SynthesisProvider>,
    responder: Arc<dyn ResponseGenerator>,
    config: OrchestratorConfig,
    inner: Mutex<Inner>,
    events: EventBus<TurnEvent>,
    runtime: Option<Handle>,
}

impl TurnOrchestrator {
    pub fn new(
        capture: Arc<CaptureController>,
        synthesis: Arc<dyn SynthesisProvider>,
        responder: Arc<dyn ResponseGenerator>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let on_capture = weak.clone();
            let subscription = capture.events().subscribe_all(move |event| {
                if let Some(this) = on_capture.upgrade() {
                    let _runtime = this.runtime.as_ref().map(Handle::enter);
                    this.handle_capture_event(event);
                }
                Ok(())
            });

            let on_synthesis = weak.clone();
            synthesis.bind(SignalSink::new(move |signal| {
                if let Some(this) = on_synthesis.upgrade() {
                    let _runtime = this.runtime.as_ref().map(Handle::enter);
                    this.handle_synthesis_signal(signal);
                }
            }));

            tracing::info!(
                capture = capture.provider_name(),
                synthesis = synthesis.name(),
                responder = responder.name(),
                "Turn orchestrator created"
            );

            Self {
                capture,
                synthesis,
                responder,
                config,
                inner: Mutex::new(Inner {
                    capture_subscription: Some(subscription),
                    ..Default::default()
                }),
                events: EventBus::new(),
                runtime: Handle::try_current().ok(),
            }
        })
    }

    /// Event bus for turn events
    pub fn events(&self) -> &EventBus<TurnEvent> {
        &self.events
    }

    pub fn capture(&self) -> &Arc<CaptureController> {
        &self.capture
    }

    /// Begin continuous capture
    pub fn start_listening(&self) -> Result<(), PipelineError> {
        if self.inner.lock().disposed {
            return Err(PipelineError::Disposed);
        }
        self.capture.start();
        Ok(())
    }

    pub fn stop_listening(&self) {
        self.capture.stop();
    }

    /// Copy of the completed turns, oldest first
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.inner.lock().history.clone()
    }

    /// Mean latency per stage, `None` without history
    pub fn average_latencies(&self) -> Option<LatencyAverages> {
        LatencyAverages::from_turns(&self.inner.lock().history)
    }

    /// Empty the history. The turn in progress is unaffected.
    pub fn clear_history(&self) {
        self.inner.lock().history.clear();
        self.events.publish(&TurnEvent::HistoryCleared);
    }

    /// Discard the turn in progress, whatever its state
    ///
    /// Returns the id of the discarded turn.
    pub fn reset_turn(&self) -> Option<String> {
        let slot = self.inner.lock().slot.take()?;

        if slot.state == TurnState::Synthesizing {
            self.synthesis.cancel();
        }

        tracing::info!(turn_id = %slot.id, state = ?slot.state, "Turn reset");
        self.events.publish(&TurnEvent::TurnAbandoned {
            turn_id: slot.id.clone(),
            state: slot.state,
        });
        Some(slot.id)
    }

    pub fn current_turn_id(&self) -> Option<String> {
        self.inner.lock().slot.as_ref().map(|s| s.id.clone())
    }

    pub fn state(&self) -> TurnState {
        self.inner.lock().current_state()
    }

    /// Whether a turn is in progress
    pub fn is_processing(&self) -> bool {
        self.inner.lock().slot.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().disposed
    }

    /// Stop capture and synthesis and detach every subscription
    ///
    /// Safe to call more than once. A reasoning call still in flight
    /// completes into a no-op.
    pub fn shutdown(&self) {
        let subscription = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.slot = None;
            inner.capture_subscription.take()
        };

        if let Some(id) = subscription {
            self.capture.events().unsubscribe(id);
        }
        self.capture.stop();
        self.synthesis.cancel();
        self.synthesis.bind(SignalSink::detached());
        self.events.clear(None);

        tracing::info!("Turn orchestrator shut down");
    }

    fn publish_all(&self, events: Vec<TurnEvent>) {
        for event in &events {
            self.events.publish(event);
        }
    }

    fn handle_capture_event(self: &Arc<Self>, event: &CaptureEvent) {
        match event {
            CaptureEvent::Started => self.on_capture_started(),
            CaptureEvent::Ended => self.on_capture_ended(),
            CaptureEvent::FinalTranscript(text) => self.on_final_transcript(text),
            CaptureEvent::PartialTranscript(text) => {
                if !self.inner.lock().disposed {
                    self.events
                        .publish(&TurnEvent::PartialTranscript { text: text.clone() });
                }
            }
            CaptureEvent::Error { error, fatal } => {
                let turn_id = {
                    let inner = self.inner.lock();
                    if inner.disposed {
                        return;
                    }
                    inner.slot.as_ref().map(|s| s.id.clone())
                };
                tracing::warn!(error = %error, fatal, "Capture error");
                self.events
                    .publish(&stage_error(TurnStage::Capture, turn_id, error.clone()));
            }
        }
    }

    fn on_capture_started(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            match inner.current_state() {
                TurnState::Idle | TurnState::Stalled => inner.open_turn(&mut events),
                state => {
                    tracing::debug!(state = ?state, "Capture restarted during active turn");
                }
            }
        }
        self.publish_all(events);
    }

    fn on_capture_ended(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            if let Some(slot) = inner.slot.as_mut() {
                if slot.state == TurnState::AwaitingInput {
                    if let Some(capture_ms) = slot.record_capture() {
                        record_stage(TurnStage::Capture, capture_ms);
                        events.push(TurnEvent::CaptureCompleted {
                            turn_id: slot.id.clone(),
                            capture_ms,
                        });
                    }
                }
            }
        }
        self.publish_all(events);
    }

    fn on_final_transcript(self: &Arc<Self>, text: &str) {
        let mut events = Vec::new();
        let request = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }

            match inner.current_state() {
                TurnState::Reasoning | TurnState::Synthesizing => {
                    tracing::debug!(text, "Transcript ignored, turn in flight");
                    events.push(TurnEvent::TranscriptIgnored {
                        text: text.to_string(),
                    });
                    None
                }
                state => {
                    if state != TurnState::AwaitingInput {
                        inner.open_turn(&mut events);
                    }
                    let history = inner.history.clone();
                    inner.slot.as_mut().map(|slot| {
                        if let Some(capture_ms) = slot.record_capture() {
                            record_stage(TurnStage::Capture, capture_ms);
                            events.push(TurnEvent::CaptureCompleted {
                                turn_id: slot.id.clone(),
                                capture_ms,
                            });
                        }
                        slot.user_input = text.to_string();
                        slot.state = TurnState::Reasoning;
                        slot.reasoning_started_at = Some(Instant::now());

                        events.push(TurnEvent::TranscriptReceived {
                            turn_id: slot.id.clone(),
                            text: text.to_string(),
                        });
                        events.push(TurnEvent::ReasoningStarted {
                            turn_id: slot.id.clone(),
                        });
                        (slot.id.clone(), history)
                    })
                }
            }
        };
        self.publish_all(events);

        if let Some((turn_id, history)) = request {
            tracing::info!(turn_id = %turn_id, "Reasoning started");
            self.spawn_reasoning(turn_id, text.to_string(), history);
        }
    }

    fn spawn_reasoning(self: &Arc<Self>, turn_id: String, text: String, history: Vec<ConversationTurn>) {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            tracing::error!(turn_id = %turn_id, "No async runtime to run reasoning");
            self.on_reasoning_finished(
                &turn_id,
                Err(Error::Generation("No async runtime available for reasoning".to_string())),
            );
            return;
        };

        let weak = Arc::downgrade(self);
        let responder = Arc::clone(&self.responder);

        runtime.spawn(async move {
            let result = responder.respond(&text, &history).await;
            match weak.upgrade() {
                Some(this) => this.on_reasoning_finished(&turn_id, result),
                None => tracing::debug!(turn_id = %turn_id, "Orchestrator dropped before reply"),
            }
        });
    }

    fn on_reasoning_finished(&self, turn_id: &str, result: voice_agent_core::Result<String>) {
        let mut events = Vec::new();
        let reply = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                tracing::debug!(turn_id, "Reply arrived after shutdown");
                return;
            }

            let Some(slot) = inner
                .slot
                .as_mut()
                .filter(|s| s.id == turn_id && s.state == TurnState::Reasoning)
            else {
                tracing::debug!(turn_id, "Discarding reply for stale turn");
                return;
            };

            let reasoning_ms = slot.reasoning_started_at.map_or(0, elapsed_ms);
            match result {
                Ok(response) => {
                    slot.reasoning_ms = reasoning_ms;
                    slot.agent_response = response.clone();
                    record_stage(TurnStage::Reasoning, reasoning_ms);
                    events.push(TurnEvent::ReasoningCompleted {
                        turn_id: slot.id.clone(),
                        response: response.clone(),
                        reasoning_ms,
                    });

                    if response.trim().is_empty() {
                        tracing::debug!(turn_id, "Empty reply, skipping synthesis");
                        inner.complete_turn(0, &mut events);
                        None
                    } else {
                        slot.state = TurnState::Synthesizing;
                        slot.synthesis_started_at = Some(Instant::now());
                        Some(response)
                    }
                }
                Err(error) => {
                    slot.state = TurnState::Stalled;
                    tracing::warn!(turn_id, error = %error, "Reasoning failed, turn stalled");
                    events.push(stage_error(
                        TurnStage::Reasoning,
                        Some(slot.id.clone()),
                        error,
                    ));
                    None
                }
            }
        };
        self.publish_all(events);

        if let Some(reply) = reply {
            // A handler may have shut down or reset while the events were out
            let still_current = {
                let inner = self.inner.lock();
                !inner.disposed
                    && inner
                        .slot
                        .as_ref()
                        .is_some_and(|s| s.id == turn_id && s.state == TurnState::Synthesizing)
            };
            if !still_current {
                tracing::debug!(turn_id, "Turn closed before synthesis, reply dropped");
                return;
            }
            if let Err(error) = self.synthesis.speak(&reply, &self.config.speech) {
                self.fail_synthesis(turn_id, error);
            }
        }
    }

    fn fail_synthesis(&self, turn_id: &str, error: Error) {
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            match inner.slot.as_mut() {
                Some(slot) if slot.id == turn_id && slot.state == TurnState::Synthesizing => {
                    slot.state = TurnState::Stalled;
                }
                _ => return,
            }
        }
        tracing::warn!(turn_id, error = %error, "Synthesis failed, turn stalled");
        self.events.publish(&stage_error(
            TurnStage::Synthesis,
            Some(turn_id.to_string()),
            error,
        ));
    }

    fn handle_synthesis_signal(&self, signal: SynthesisSignal) {
        let mut events = Vec::new();
        let failed = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            let Some(slot) = inner
                .slot
                .as_mut()
                .filter(|s| s.state == TurnState::Synthesizing)
            else {
                tracing::debug!(signal = ?signal, "Synthesis signal outside a turn");
                return;
            };

            match signal {
                SynthesisSignal::Started => {
                    events.push(TurnEvent::SpeechOutputStarted {
                        turn_id: slot.id.clone(),
                    });
                    None
                }
                SynthesisSignal::Ended => {
                    let synthesis_ms = slot.synthesis_started_at.map_or(0, elapsed_ms);
                    events.push(TurnEvent::SpeechOutputEnded {
                        turn_id: slot.id.clone(),
                    });
                    inner.complete_turn(synthesis_ms, &mut events);
                    None
                }
                SynthesisSignal::Error(detail) => Some((slot.id.clone(), detail)),
            }
        };
        self.publish_all(events);

        if let Some((turn_id, detail)) = failed {
            self.fail_synthesis(&turn_id, Error::Synthesis(detail));
        }
    }
}

impl Drop for TurnOrchestrator {
    fn drop(&mut self) {
        if let Some(id) = self.inner.get_mut().capture_subscription.take() {
            self.capture.events().unsubscribe(id);
        }
    }
}
