//! Traits at the seams between the orchestrator and its collaborators

mod llm;
mod responder;
mod speech;

pub use llm::{LanguageModel, TextStream};
pub use responder::ResponseGenerator;
pub use speech::{
    CaptureProvider, CaptureSignal, RecognitionSegment, SignalSink, SpeechParams,
    SynthesisProvider, SynthesisSignal,
};
