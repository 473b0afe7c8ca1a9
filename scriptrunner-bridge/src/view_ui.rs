//! Text rendering of the output pane, button row and buffer.
//!
//! Everything renders to `ViewLine`s first; `paint` is the only place that
//! touches the terminal.

use crate::app::ScriptRunnerApp;
use crate::helpers::{format_duration_short, short_path};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use scriptrunner_core::{RunFailure, RunState, ScriptBuffer};

use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Muted,
    Pending,
    Success,
    Error,
    /// The clickable diagnostic label.
    Link,
}

impl Tone {
    fn color(self) -> Option<Color> {
        match self {
            Tone::Plain => None,
            Tone::Muted => Some(Color::DarkGrey),
            Tone::Pending => Some(Color::Yellow),
            Tone::Success => Some(Color::Green),
            Tone::Error => Some(Color::Red),
            Tone::Link => Some(Color::Cyan),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLine {
    pub tone: Tone,
    pub text: String,
}

impl ViewLine {
    pub fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

fn push_block(lines: &mut Vec<ViewLine>, tone: Tone, block: &str) {
    for line in block.lines() {
        lines.push(ViewLine::new(tone, line));
    }
}

// ────────────────────────────────────────────────────────────────
// Output pane
// ────────────────────────────────────────────────────────────────

pub fn output_pane(state: &RunState) -> Vec<ViewLine> {
    let mut lines = Vec::new();

    match state {
        RunState::Idle => {
            lines.push(ViewLine::new(Tone::Muted, "💤 Waiting to run script..."));
        }
        RunState::Running => {
            lines.push(ViewLine::new(Tone::Pending, "⏳ Script is running..."));
        }
        RunState::Succeeded { output, exit_code } => {
            lines.push(ViewLine::new(
                Tone::Success,
                format!("✅ Exit Code: {}", exit_code),
            ));
            push_block(&mut lines, Tone::Success, output);
        }
        RunState::Failed(failure) => render_failure(&mut lines, failure),
    }

    lines
}

fn render_failure(lines: &mut Vec<ViewLine>, failure: &RunFailure) {
    match failure {
        RunFailure::Script {
            output,
            exit_code,
            location,
        } => {
            lines.push(ViewLine::new(Tone::Error, "❌ Error occurred"));
            lines.push(ViewLine::new(Tone::Error, format!("Exit Code: {}", exit_code)));
            match location {
                // The raw text names the temp file; only the label is shown.
                Some(loc) => {
                    lines.push(ViewLine::new(Tone::Link, loc.label()));
                    lines.push(ViewLine::new(Tone::Muted, "(:goto jumps to this error)"));
                }
                None => push_block(lines, Tone::Error, output),
            }
        }
        RunFailure::Launch { reason } => {
            lines.push(ViewLine::new(Tone::Error, "🚫 Could not run script"));
            lines.push(ViewLine::new(Tone::Error, reason.clone()));
        }
        RunFailure::TimedOut { .. } => {
            lines.push(ViewLine::new(Tone::Error, "⌛ Script timed out"));
            lines.push(ViewLine::new(Tone::Error, failure.message()));
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Button row + status
// ────────────────────────────────────────────────────────────────

/// Run is disabled (and relabelled) while a run is in flight.
pub fn button_row(state: &RunState) -> ViewLine {
    if state.is_running() {
        ViewLine::new(Tone::Muted, "[ Running... ]  [ Reset ]")
    } else {
        ViewLine::new(Tone::Plain, "[ Run Script ]  [ Reset ]")
    }
}

pub fn status_line(app: &ScriptRunnerApp) -> ViewLine {
    let (line, column) = app.buffer.caret_position();
    let source = app
        .source_path
        .as_deref()
        .map(short_path)
        .unwrap_or_else(|| "untitled".to_string());
    let mut text = format!(
        "📄 {}  │  {} line(s)  │  caret {}:{}  │  {}",
        source,
        app.buffer.text().lines().count(),
        line,
        column,
        app.controller.state().label(),
    );
    if let Some(started) = app.run_started {
        text.push_str(&format!(
            "  │  ⏱ {}",
            format_duration_short(started.elapsed().as_secs())
        ));
    }
    ViewLine::new(Tone::Muted, text)
}

// ────────────────────────────────────────────────────────────────
// Buffer
// ────────────────────────────────────────────────────────────────

/// Numbered listing with the caret line marked.
pub fn buffer_view(buffer: &ScriptBuffer) -> Vec<ViewLine> {
    if buffer.is_empty() {
        return vec![ViewLine::new(Tone::Muted, "(empty buffer)")];
    }

    let (caret_line, _) = buffer.caret_position();
    let text = buffer.text();
    let body = text.strip_suffix('\n').unwrap_or(text);
    let total = body.split('\n').count();
    let width = total.to_string().len();

    body.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let number = idx + 1;
            let marker = if number == caret_line { '>' } else { ' ' };
            let tone = if number == caret_line {
                Tone::Link
            } else {
                Tone::Plain
            };
            ViewLine::new(
                tone,
                format!("{}{:>width$} │ {}", marker, number, line, width = width),
            )
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────

pub fn paint<W: Write>(out: &mut W, lines: &[ViewLine], color: bool) -> io::Result<()> {
    for line in lines {
        match line.tone.color().filter(|_| color) {
            Some(fg) => {
                queue!(out, SetForegroundColor(fg))?;
                if line.tone == Tone::Link {
                    queue!(out, SetAttribute(Attribute::Underlined))?;
                }
                queue!(
                    out,
                    Print(&line.text),
                    SetAttribute(Attribute::Reset),
                    ResetColor,
                    Print("\n")
                )?;
            }
            None => writeln!(out, "{}", line.text)?,
        }
    }
    out.flush()
}

/// Lines joined without styling.
pub fn plain_text(lines: &[ViewLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
