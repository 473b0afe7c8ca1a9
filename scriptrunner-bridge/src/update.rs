//! Update logic: the central message handler.
//!
//! All state changes go through `update`; it never blocks. Waiting for a run
//! to finish is the caller's job (see `session`), which feeds the result back
//! in as `Message::RunFinished`.

use crate::app::ScriptRunnerApp;
use crate::messages::{Message, HELP_TEXT};
use crate::view_ui::{buffer_view, plain_text};

use std::time::Instant;

/// What the session loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    None,
    /// The run state changed; redraw the output pane.
    RedrawPane,
    Exit,
}

pub fn update(app: &mut ScriptRunnerApp, message: Message) -> Task {
    match message {
        // ────────────────────────────────────────────────────
        // Editing
        // ────────────────────────────────────────────────────

        Message::Edit(line) => {
            app.buffer.push_line(&line);
            Task::None
        }

        Message::Load(path) => match std::fs::read_to_string(&path) {
            Ok(text) => {
                app.buffer.set_text(text);
                app.notice(format!(
                    "📂 Loaded {} ({} line(s))",
                    path.display(),
                    app.buffer.text().lines().count()
                ));
                app.source_path = Some(path);
                Task::None
            }
            Err(e) => {
                app.notice(format!("❌ Failed to read {}: {}", path.display(), e));
                Task::None
            }
        },

        Message::Show => {
            let listing = plain_text(&buffer_view(&app.buffer));
            app.notice(listing);
            Task::None
        }

        // ────────────────────────────────────────────────────
        // Run lifecycle
        // ────────────────────────────────────────────────────

        Message::Run => {
            let snapshot = app.buffer.snapshot();
            if app.controller.request_run(snapshot) {
                app.run_started = Some(Instant::now());
                Task::RedrawPane
            } else {
                app.notice("⏳ A run is already in progress.");
                Task::None
            }
        }

        Message::RunFinished(state) => {
            tracing::debug!(state = state.label(), "Run finished");
            Task::RedrawPane
        }

        Message::Reset => {
            app.controller.request_reset();
            app.buffer.clear();
            app.source_path = None;
            app.run_started = None;
            Task::RedrawPane
        }

        Message::GotoError => {
            if !app.controller.activate_diagnostic() {
                app.notice("No error location to jump to.");
                return Task::None;
            }

            // The editor is the consumer of the request.
            if let Some(request) = app.controller.take_cursor_request() {
                let offset = app.buffer.apply_cursor_request(request);
                let (line, column) = app.buffer.caret_position();
                let text = app.buffer.caret_line().to_string();
                app.notice(format!(
                    "➡ Caret at {}:{} (offset {})  {}",
                    line, column, offset, text
                ));
            }
            Task::None
        }

        // ────────────────────────────────────────────────────
        // Misc
        // ────────────────────────────────────────────────────

        Message::Help => {
            app.notice(HELP_TEXT);
            Task::None
        }

        Message::Unknown(input) => {
            app.notice(format!("❓ Unknown command: {}  (type :help)", input));
            Task::None
        }

        Message::Quit => {
            app.should_quit = true;
            Task::Exit
        }
    }
}
