//! Console rendering of turn events and reports

use voice_agent_core::{ConversationTurn, LatencyAverages};
use voice_agent_pipeline::{TurnEvent, TurnStage};

/// One status line for an event, `None` for events not worth printing
pub fn describe_event(event: &TurnEvent) -> Option<String> {
    match event {
        TurnEvent::TranscriptReceived { text, .. } => Some(format!("> {}", text)),
        TurnEvent::PartialTranscript { .. } => None,
        TurnEvent::TranscriptIgnored { text } => {
            Some(format!("(still answering, ignored \"{}\")", text))
        }
        TurnEvent::ReasoningStarted { .. } => Some("(thinking...)".to_string()),
        TurnEvent::TurnCompleted(turn) => Some(format!(
            "(turn done in {} ms: capture {} / reasoning {} / speech {})",
            turn.latency.total_ms,
            turn.latency.capture_ms,
            turn.latency.reasoning_ms,
            turn.latency.synthesis_ms
        )),
        TurnEvent::TurnAbandoned { turn_id, .. } => Some(format!("(abandoned {})", turn_id)),
        TurnEvent::HistoryCleared => Some("(history cleared)".to_string()),
        TurnEvent::Error { stage, error, .. } => {
            let hint = match stage {
                TurnStage::Capture => "",
                TurnStage::Reasoning | TurnStage::Synthesis => {
                    " Say something new or /reset to continue."
                }
            };
            Some(format!("! {} failed: {}.{}", stage.as_str(), error, hint))
        }
        _ => None,
    }
}

pub fn format_history(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "No completed turns.".to_string();
    }

    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            format!(
                "{:>3}. [{}] you: {}\n     agent: {} ({} ms)",
                i + 1,
                turn.timestamp.format("%H:%M:%S"),
                turn.user_input,
                turn.agent_response,
                turn.latency.total_ms
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_latency(averages: Option<LatencyAverages>) -> String {
    match averages {
        None => "No completed turns.".to_string(),
        Some(avg) => format!(
            "Average over {} turn(s): capture {:.0} ms, reasoning {:.0} ms, speech {:.0} ms, total {:.0} ms",
            avg.turns, avg.capture_ms, avg.reasoning_ms, avg.synthesis_ms, avg.total_ms
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::{Error, LatencyBreakdown};

    fn turn() -> ConversationTurn {
        ConversationTurn {
            id: "turn_1".to_string(),
            timestamp: chrono::Utc::now(),
            user_input: "What color is the sky?".to_string(),
            agent_response: "Blue.".to_string(),
            latency: LatencyBreakdown {
                capture_ms: 300,
                reasoning_ms: 200,
                synthesis_ms: 100,
                total_ms: 600,
            },
        }
    }

    #[test]
    fn test_describe_completed_turn() {
        let line = describe_event(&TurnEvent::TurnCompleted(turn())).unwrap();
        assert_eq!(
            line,
            "(turn done in 600 ms: capture 300 / reasoning 200 / speech 100)"
        );
        assert!(describe_event(&TurnEvent::PartialTranscript {
            text: "wh".to_string()
        })
        .is_none());
    }

    #[test]
    fn test_describe_reasoning_error() {
        let line = describe_event(&TurnEvent::Error {
            stage: TurnStage::Reasoning,
            turn_id: Some("turn_1".to_string()),
            error: Error::EmptyResponse,
        })
        .unwrap();
        assert!(line.starts_with("! reasoning failed: No response generated from LLM."));
        assert!(line.ends_with("/reset to continue."));
    }

    #[test]
    fn test_format_history_and_latency() {
        assert_eq!(format_history(&[]), "No completed turns.");
        let history = format_history(&[turn()]);
        assert!(history.contains("you: What color is the sky?"));
        assert!(history.contains("agent: Blue. (600 ms)"));

        let averages = LatencyAverages::from_turns(&[turn()]);
        assert_eq!(
            format_latency(averages),
            "Average over 1 turn(s): capture 300 ms, reasoning 200 ms, speech 100 ms, total 600 ms"
        );
    }
}
