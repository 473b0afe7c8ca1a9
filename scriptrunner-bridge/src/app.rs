//! Application state.

use scriptrunner_core::{RunController, ScriptBuffer};

use std::path::PathBuf;
use std::time::Instant;

// ────────────────────────────────────────────────────────────────
// ScriptRunnerApp
// ────────────────────────────────────────────────────────────────

/// Max notices kept between redraws. Oldest dropped when exceeded.
pub const MAX_NOTICES: usize = 64;

#[derive(Debug)]
pub struct ScriptRunnerApp {
    pub controller: RunController,

    /// The script being edited.
    pub buffer: ScriptBuffer,

    /// File the buffer was loaded from, if any.
    pub source_path: Option<PathBuf>,

    /// One-line status messages waiting to be printed.
    pub notices: Vec<String>,

    /// When the current (or last) run was started.
    pub run_started: Option<Instant>,

    pub should_quit: bool,
}

impl ScriptRunnerApp {
    pub fn new(controller: RunController) -> Self {
        Self {
            controller,
            buffer: ScriptBuffer::new(),
            source_path: None,
            notices: Vec::new(),
            run_started: None,
            should_quit: false,
        }
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}
