//! Console front end
//!
//! Runs the turn orchestrator in a terminal: typed lines stand in for
//! recognized speech and replies are printed instead of spoken.

pub mod commands;
pub mod console;
pub mod display;

pub use commands::{Command, CommandError, HELP};
pub use console::{playback_duration, ConsoleCapture, ConsoleSynthesis};
