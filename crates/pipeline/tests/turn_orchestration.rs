//! Turn orchestration against scripted providers
//!
//! All tests run on a paused clock so stage latencies are exact.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use voice_agent_core::{
    CaptureSignal, ConversationTurn, Error, ResponseGenerator, Result, SynthesisProvider,
};
use voice_agent_pipeline::{
    CaptureConfig, CaptureController, OrchestratorConfig, PipelineError, ScriptedCapture,
    ScriptedSynthesis, TurnEvent, TurnEventKind, TurnOrchestrator, TurnStage, TurnState,
};

/// Replies after a fixed delay, "Blue." unless a reply was queued
struct StubResponder {
    delay: Duration,
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StubResponder {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn queue(&self, reply: Result<String>) {
        self.replies.lock().push_back(reply);
    }
}

#[async_trait]
impl ResponseGenerator for StubResponder {
    async fn respond(&self, user_text: &str, history: &[ConversationTurn]) -> Result<String> {
        self.calls.lock().push((user_text.to_string(), history.len()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("Blue.".to_string()))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct Harness {
    capture: Arc<ScriptedCapture>,
    synthesis: Arc<ScriptedSynthesis>,
    responder: Arc<StubResponder>,
    orchestrator: Arc<TurnOrchestrator>,
    events: Arc<Mutex<Vec<TurnEvent>>>,
}

impl Harness {
    fn new(reasoning_delay_ms: u64) -> Self {
        let capture = Arc::new(ScriptedCapture::new());
        let synthesis = Arc::new(ScriptedSynthesis::new());
        let responder = StubResponder::new(reasoning_delay_ms);

        let controller = CaptureController::new(capture.clone(), CaptureConfig::default());
        let orchestrator = TurnOrchestrator::new(
            controller,
            synthesis.clone(),
            responder.clone(),
            OrchestratorConfig::default(),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        orchestrator.events().subscribe_all(move |e| {
            sink.lock().push(e.clone());
            Ok(())
        });

        Self {
            capture,
            synthesis,
            responder,
            orchestrator,
            events,
        }
    }

    fn errors(&self) -> Vec<(TurnStage, Option<String>, Error)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Error {
                    stage,
                    turn_id,
                    error,
                } => Some((*stage, turn_id.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&TurnEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(ms: u64) {
    settle().await;
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_turn_records_stage_latencies() {
    let h = Harness::new(200);

    h.orchestrator.start_listening().unwrap();
    assert_eq!(h.orchestrator.state(), TurnState::AwaitingInput);
    let turn_id = h.orchestrator.current_turn_id().unwrap();

    advance(300).await;
    h.capture.end_stream();
    h.capture.say("What color is the sky?");
    assert_eq!(h.orchestrator.state(), TurnState::Reasoning);

    advance(200).await;
    assert_eq!(h.orchestrator.state(), TurnState::Synthesizing);
    assert_eq!(h.synthesis.spoken(), vec!["Blue.".to_string()]);

    advance(100).await;
    h.synthesis.finish();

    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    let turn = &history[0];
    assert_eq!(turn.id, turn_id);
    assert_eq!(turn.user_input, "What color is the sky?");
    assert_eq!(turn.agent_response, "Blue.");
    assert_eq!(turn.latency.capture_ms, 300);
    assert_eq!(turn.latency.reasoning_ms, 200);
    assert_eq!(turn.latency.synthesis_ms, 100);
    assert_eq!(turn.latency.total_ms, 600);

    assert_eq!(h.orchestrator.state(), TurnState::Idle);
    assert!(h.orchestrator.current_turn_id().is_none());
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_turn_events_in_stage_order() {
    let h = Harness::new(10);

    h.orchestrator.start_listening().unwrap();
    h.capture.say("hello");
    advance(10).await;
    h.synthesis.finish();

    let kinds: Vec<&'static str> = h
        .events
        .lock()
        .iter()
        .map(|e| match e {
            TurnEvent::TurnInputStarted { .. } => "input_started",
            TurnEvent::CaptureCompleted { .. } => "capture_completed",
            TurnEvent::TranscriptReceived { .. } => "transcript",
            TurnEvent::ReasoningStarted { .. } => "reasoning_started",
            TurnEvent::ReasoningCompleted { .. } => "reasoning_completed",
            TurnEvent::SpeechOutputStarted { .. } => "speech_started",
            TurnEvent::SpeechOutputEnded { .. } => "speech_ended",
            TurnEvent::TurnCompleted(_) => "completed",
            _ => "other",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "input_started",
            "capture_completed",
            "transcript",
            "reasoning_started",
            "reasoning_completed",
            "speech_started",
            "speech_ended",
            "completed",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_capture_restart_does_not_open_second_turn() {
    let h = Harness::new(1_000);

    h.orchestrator.start_listening().unwrap();
    h.capture.say("first question");
    let turn_id = h.orchestrator.current_turn_id().unwrap();

    // Stream ends mid-reasoning and the controller restarts it
    h.capture.end_stream();
    advance(100).await;
    assert_eq!(h.capture.start_calls(), 2);
    assert!(h.orchestrator.capture().is_active());

    h.capture.say("second question");

    assert_eq!(h.orchestrator.current_turn_id(), Some(turn_id));
    assert_eq!(h.orchestrator.state(), TurnState::Reasoning);
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TurnInputStarted { .. })),
        1
    );
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TranscriptIgnored { text } if text == "second question")),
        1
    );
    assert_eq!(h.responder.calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_restart_during_playback_keeps_turn() {
    let h = Harness::new(10);

    h.orchestrator.start_listening().unwrap();
    h.capture.say("first question");
    let turn_id = h.orchestrator.current_turn_id().unwrap();
    advance(10).await;
    assert_eq!(h.orchestrator.state(), TurnState::Synthesizing);

    h.capture.end_stream();
    advance(100).await;
    assert_eq!(h.capture.start_calls(), 2);
    h.capture.say("interrupting");

    assert_eq!(h.orchestrator.current_turn_id(), Some(turn_id.clone()));
    assert_eq!(h.orchestrator.state(), TurnState::Synthesizing);
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TurnInputStarted { .. })),
        1
    );

    h.synthesis.finish();
    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, turn_id);
    assert_eq!(history[0].user_input, "first question");
}

#[tokio::test(start_paused = true)]
async fn test_signals_from_provider_threads() {
    let h = Harness::new(200);
    h.orchestrator.start_listening().unwrap();

    let capture = Arc::clone(&h.capture);
    std::thread::spawn(move || capture.say("What color is the sky?"))
        .join()
        .expect("capture thread panicked");
    assert_eq!(h.orchestrator.state(), TurnState::Reasoning);

    advance(200).await;
    assert_eq!(h.orchestrator.state(), TurnState::Synthesizing);

    let synthesis = Arc::clone(&h.synthesis);
    std::thread::spawn(move || synthesis.finish())
        .join()
        .expect("synthesis thread panicked");

    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].agent_response, "Blue.");
    assert_eq!(history[0].latency.reasoning_ms, 200);
    assert!(h.errors().is_empty());
}

#[test]
fn test_reasoning_without_runtime_stalls_turn() {
    let h = Harness::new(0);
    h.orchestrator.start_listening().unwrap();

    h.capture.say("hello?");
    assert_eq!(h.orchestrator.state(), TurnState::Stalled);
    let errors = h.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, TurnStage::Reasoning);
    assert_eq!(errors[0].1, h.orchestrator.current_turn_id());
    assert_eq!(errors[0].2.kind(), "generation");

    // The stalled turn is replaced rather than wedging later input
    h.capture.say("anyone?");
    assert_eq!(h.orchestrator.state(), TurnState::Stalled);
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TurnAbandoned { .. })),
        1
    );
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TranscriptIgnored { .. })),
        0
    );
    assert!(h.responder.calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_on_reply_skips_synthesis() {
    let h = Harness::new(10);
    let weak = Arc::downgrade(&h.orchestrator);
    h.orchestrator
        .events()
        .subscribe(TurnEventKind::ReasoningCompleted, move |_| {
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.shutdown();
            }
            Ok(())
        });

    h.orchestrator.start_listening().unwrap();
    h.capture.say("hello");
    advance(10).await;

    assert!(h.orchestrator.is_shut_down());
    assert!(h.synthesis.spoken().is_empty());
    assert!(!h.synthesis.is_speaking());
}

#[tokio::test(start_paused = true)]
async fn test_reset_on_reply_skips_synthesis() {
    let h = Harness::new(10);
    let weak = Arc::downgrade(&h.orchestrator);
    h.orchestrator
        .events()
        .subscribe(TurnEventKind::ReasoningCompleted, move |_| {
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.reset_turn();
            }
            Ok(())
        });

    h.orchestrator.start_listening().unwrap();
    h.capture.say("hello");
    advance(10).await;

    assert_eq!(h.orchestrator.state(), TurnState::Idle);
    assert!(h.synthesis.spoken().is_empty());
    assert!(h.orchestrator.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reasoning_failure_stalls_turn() {
    let h = Harness::new(50);
    h.responder
        .queue(Err(Error::transport(Some(503), "Service Unavailable")));

    h.orchestrator.start_listening().unwrap();
    h.capture.say("are you there?");
    let stalled_id = h.orchestrator.current_turn_id().unwrap();
    advance(50).await;

    assert_eq!(h.orchestrator.state(), TurnState::Stalled);
    assert!(h.orchestrator.is_processing());
    assert!(h.synthesis.spoken().is_empty());
    assert!(h.orchestrator.history().is_empty());

    let errors = h.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, TurnStage::Reasoning);
    assert_eq!(errors[0].1.as_deref(), Some(stalled_id.as_str()));
    assert_eq!(
        errors[0].2.to_string(),
        "LLM API error: 503 - Service Unavailable"
    );

    // No automatic retry
    advance(1_000).await;
    assert_eq!(h.responder.calls.lock().len(), 1);

    // A fresh capture start recovers with a new turn
    h.capture.end_stream();
    advance(100).await;

    let new_id = h.orchestrator.current_turn_id().unwrap();
    assert_ne!(new_id, stalled_id);
    assert_eq!(h.orchestrator.state(), TurnState::AwaitingInput);
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TurnAbandoned { turn_id, state: TurnState::Stalled } if *turn_id == stalled_id)),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_transcript_recovers_stalled_turn() {
    let h = Harness::new(0);
    h.responder.queue(Err(Error::EmptyResponse));

    h.capture.say("first");
    settle().await;
    assert_eq!(h.orchestrator.state(), TurnState::Stalled);

    h.capture.say("second");
    settle().await;
    h.synthesis.finish();

    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_input, "second");
}

#[tokio::test(start_paused = true)]
async fn test_reset_turn_clears_slot() {
    let h = Harness::new(0);
    h.responder.queue(Err(Error::EmptyResponse));

    h.capture.say("hello");
    settle().await;
    let stalled = h.orchestrator.current_turn_id();

    assert_eq!(h.orchestrator.reset_turn(), stalled);
    assert_eq!(h.orchestrator.state(), TurnState::Idle);
    assert!(h.orchestrator.reset_turn().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_synthesis_cancels_playback() {
    let h = Harness::new(0);

    h.capture.say("hello");
    settle().await;
    assert_eq!(h.orchestrator.state(), TurnState::Synthesizing);

    h.orchestrator.reset_turn();
    assert_eq!(h.synthesis.cancel_calls(), 1);

    // Late end signal from the cancelled playback is ignored
    h.synthesis.finish();
    assert!(h.orchestrator.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_after_shutdown_is_ignored() {
    let h = Harness::new(500);

    h.orchestrator.start_listening().unwrap();
    h.capture.say("slow question");
    settle().await;

    h.orchestrator.shutdown();
    h.orchestrator.shutdown();
    assert!(h.orchestrator.is_shut_down());
    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.synthesis.cancel_calls(), 1);

    advance(500).await;

    assert!(h.synthesis.spoken().is_empty());
    assert!(h.orchestrator.history().is_empty());
    assert!(h.orchestrator.events().is_empty());
    assert_eq!(
        h.orchestrator.start_listening(),
        Err(PipelineError::Disposed)
    );

    // Capture signals no longer reach the orchestrator
    h.capture.say("anyone?");
    assert!(h.orchestrator.current_turn_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_clear_history_resets_averages() {
    let h = Harness::new(20);

    for question in ["one", "two"] {
        h.capture.say(question);
        advance(20).await;
        h.synthesis.finish();
    }

    let averages = h.orchestrator.average_latencies().unwrap();
    assert_eq!(averages.turns, 2);
    assert_eq!(averages.reasoning_ms, 20.0);

    h.orchestrator.clear_history();
    assert!(h.orchestrator.history().is_empty());
    assert!(h.orchestrator.average_latencies().is_none());
    assert_eq!(h.count(|e| matches!(e, TurnEvent::HistoryCleared)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_history_keeps_turn_in_progress() {
    let h = Harness::new(100);

    h.capture.say("question");
    let turn_id = h.orchestrator.current_turn_id();
    h.orchestrator.clear_history();

    assert_eq!(h.orchestrator.current_turn_id(), turn_id);
    advance(100).await;
    h.synthesis.finish();
    assert_eq!(h.orchestrator.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transcript_without_start_allocates_turn() {
    let h = Harness::new(0);

    h.capture.say("no start signal");
    assert!(h.orchestrator.current_turn_id().is_some());
    settle().await;
    h.synthesis.finish();

    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].latency.capture_ms, 0);
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::TurnInputStarted { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_capture_error_does_not_end_turn() {
    let h = Harness::new(0);

    h.orchestrator.start_listening().unwrap();
    let turn_id = h.orchestrator.current_turn_id();
    h.capture.emit(CaptureSignal::Error("audio-capture".to_string()));

    let errors = h.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, TurnStage::Capture);
    assert_eq!(errors[0].1, turn_id);
    assert_eq!(h.orchestrator.state(), TurnState::AwaitingInput);
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_stalls_turn() {
    let h = Harness::new(0);

    h.capture.say("speak up");
    settle().await;
    h.synthesis.fail_playback("audio device lost");

    assert_eq!(h.orchestrator.state(), TurnState::Stalled);
    let errors = h.errors();
    assert_eq!(errors[0].0, TurnStage::Synthesis);
    assert_eq!(
        errors[0].2,
        Error::Synthesis("audio device lost".to_string())
    );
    assert!(h.orchestrator.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_speak_stalls_turn() {
    let h = Harness::new(0);
    h.synthesis.fail_next_speak();

    h.capture.say("speak up");
    settle().await;

    assert_eq!(h.orchestrator.state(), TurnState::Stalled);
    assert_eq!(h.errors()[0].0, TurnStage::Synthesis);
}

#[tokio::test(start_paused = true)]
async fn test_empty_reply_skips_synthesis() {
    let h = Harness::new(0);
    h.responder.queue(Ok("   ".to_string()));

    h.capture.say("say nothing");
    settle().await;

    assert!(h.synthesis.spoken().is_empty());
    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].latency.synthesis_ms, 0);
    assert_eq!(h.orchestrator.state(), TurnState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_history_passed_to_responder() {
    let h = Harness::new(0);

    for question in ["first", "second"] {
        h.capture.say(question);
        settle().await;
        h.synthesis.finish();
    }

    assert_eq!(
        *h.responder.calls.lock(),
        vec![("first".to_string(), 0), ("second".to_string(), 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_partial_transcripts_forwarded() {
    let h = Harness::new(0);

    h.capture.interim("what col");
    assert_eq!(
        h.count(|e| matches!(e, TurnEvent::PartialTranscript { text } if text == "what col")),
        1
    );
    assert!(h.orchestrator.current_turn_id().is_none());
}
