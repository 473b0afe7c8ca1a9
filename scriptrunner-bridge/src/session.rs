//! The two ways of driving the app: one-shot and interactive.

use crate::app::ScriptRunnerApp;
use crate::messages::Message;
use crate::update::{update, Task};
use crate::view_ui::{button_row, output_pane, paint, status_line, ViewLine, Tone};

use anyhow::{Context, Result};
use scriptrunner_core::{RunFailure, RunState};

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// How a one-shot run ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    Succeeded,
    ScriptFailed,
    CouldNotRun,
}

impl RunVerdict {
    pub fn of(state: &RunState) -> Self {
        match state {
            RunState::Failed(RunFailure::Script { .. }) => RunVerdict::ScriptFailed,
            RunState::Failed(_) => RunVerdict::CouldNotRun,
            _ => RunVerdict::Succeeded,
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            RunVerdict::Succeeded => 0,
            RunVerdict::ScriptFailed => 1,
            RunVerdict::CouldNotRun => 2,
        }
    }
}

fn flush_notices<W: Write>(app: &mut ScriptRunnerApp, out: &mut W, color: bool) -> Result<()> {
    let notices: Vec<ViewLine> = app
        .take_notices()
        .into_iter()
        .flat_map(|n| {
            n.lines()
                .map(|l| ViewLine::new(Tone::Plain, l))
                .collect::<Vec<_>>()
        })
        .collect();
    paint(out, &notices, color).context("failed to write to terminal")
}

fn draw_pane<W: Write>(app: &ScriptRunnerApp, out: &mut W, color: bool) -> Result<()> {
    let state = app.controller.state();
    let mut lines = output_pane(state);
    lines.push(button_row(state));
    lines.push(status_line(app));
    paint(out, &lines, color).context("failed to write to terminal")
}

fn dispatch<W: Write>(
    app: &mut ScriptRunnerApp,
    message: Message,
    out: &mut W,
    color: bool,
) -> Result<Task> {
    let task = update(app, message);
    flush_notices(app, out, color)?;
    if task == Task::RedrawPane {
        draw_pane(app, out, color)?;
    }
    Ok(task)
}

/// Run the buffer once, print the result, optionally jump to the error.
pub async fn run_once<W: Write>(
    app: &mut ScriptRunnerApp,
    goto_error: bool,
    out: &mut W,
    color: bool,
) -> Result<RunVerdict> {
    dispatch(app, Message::Run, out, color)?;

    let state = app.controller.next_completion().await;
    let verdict = RunVerdict::of(&state);
    dispatch(app, Message::RunFinished(state), out, color)?;

    if goto_error && verdict == RunVerdict::ScriptFailed {
        dispatch(app, Message::GotoError, out, color)?;
    }
    Ok(verdict)
}

/// Line-oriented editing session. Ends on `:quit` or end of input; a run
/// still in flight at end of input is waited for.
pub async fn interactive<R, W>(
    app: &mut ScriptRunnerApp,
    input: R,
    out: &mut W,
    color: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    draw_pane(app, out, color)?;

    while !app.should_quit {
        let running = app.controller.state().is_running();

        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read input")? {
                    Some(line) => {
                        dispatch(app, Message::from_input(&line), out, color)?;
                    }
                    None => {
                        if app.controller.state().is_running() {
                            let state = app.controller.next_completion().await;
                            dispatch(app, Message::RunFinished(state), out, color)?;
                        }
                        break;
                    }
                }
            }
            state = app.controller.next_completion(), if running => {
                dispatch(app, Message::RunFinished(state), out, color)?;
            }
        }
    }

    Ok(())
}
