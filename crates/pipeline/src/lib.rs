//! Turn pipeline
//!
//! Binds speech capture, response generation and speech synthesis into
//! ordered conversation turns:
//! - [`CaptureController`] keeps a continuous capture stream running over an
//!   unreliable provider, restarting it with bounded retries
//! - [`TurnOrchestrator`] runs the capture → reasoning → synthesis state
//!   machine and records per-stage latency
//! - [`scripted`] provides deterministic providers for tests and demos

pub mod capture;
pub mod orchestrator;
pub mod scripted;

pub use capture::{CaptureConfig, CaptureController, CaptureEvent, CaptureEventKind, CaptureState};
pub use orchestrator::{
    OrchestratorConfig, TurnEvent, TurnEventKind, TurnOrchestrator, TurnStage, TurnState,
};
pub use scripted::{ScriptedCapture, ScriptedSynthesis};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Orchestrator has been shut down")]
    Disposed,
}

