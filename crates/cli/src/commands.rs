//! Console commands

use std::path::PathBuf;
use thiserror::Error;

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Anything that is not a command is spoken input
    Say(String),
    Ingest(PathBuf),
    History,
    Stats,
    Latency,
    Clear,
    Reset,
    Pause,
    Resume,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("Usage: {0}")]
    MissingArgument(&'static str),
}

impl Command {
    /// Parse a line; blank input yields `None`
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Say(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "ingest" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("/ingest <path>"));
                }
                Command::Ingest(PathBuf::from(arg))
            }
            "history" => Command::History,
            "stats" => Command::Stats,
            "latency" => Command::Latency,
            "clear" => Command::Clear,
            "reset" => Command::Reset,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

pub const HELP: &str = "\
Type to speak. Commands:
  /ingest <path>  add a .txt, .md, .json or .csv file to the knowledge index
  /history        list completed turns
  /stats          index and capture statistics
  /latency        average stage latencies
  /clear          clear conversation history
  /reset          abandon the turn in progress
  /pause          stop listening
  /resume         start listening again
  /quit           exit";
