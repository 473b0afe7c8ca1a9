//! Message enum and input-line parsing.
//!
//! In the interactive session every stdin line becomes one `Message`. Lines
//! starting with `:` are commands; anything else is script text. A leading
//! `::` escapes a literal `:`.

use scriptrunner_core::RunState;

use std::path::PathBuf;

// ────────────────────────────────────────────────────────────────
// Message enum
// ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Append a line of script text.
    Edit(String),
    Run,
    RunFinished(RunState),
    Reset,
    GotoError,
    Show,
    Load(PathBuf),
    Help,
    Quit,
    Unknown(String),
}

impl Message {
    pub fn from_input(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix("::") {
            return Message::Edit(format!(":{}", rest));
        }

        let Some(command) = line.strip_prefix(':') else {
            return Message::Edit(line.to_string());
        };

        let mut parts = command.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("");
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match (name, arg) {
            ("run" | "r", None) => Message::Run,
            ("reset", None) => Message::Reset,
            ("goto" | "g", None) => Message::GotoError,
            ("show" | "s", None) => Message::Show,
            ("load" | "l", Some(path)) => Message::Load(PathBuf::from(path)),
            ("help" | "h" | "?", None) => Message::Help,
            ("quit" | "q" | "exit", None) => Message::Quit,
            _ => Message::Unknown(line.to_string()),
        }
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  :run            Run the buffer
  :reset          Clear the buffer and the output
  :goto           Move the caret to the reported error
  :show           Print the buffer with line numbers
  :load <file>    Replace the buffer with a file
  :help           This help message
  :quit           Leave

Any other line is appended to the buffer. Start a line with :: to insert a literal ':'.";
