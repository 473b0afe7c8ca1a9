use crate::runtime::diagnostics::{CompilerLineGrammar, DiagnosticGrammar, DiagnosticLocation};
use crate::runtime::offset::offset_for;

use scriptrunner_script::{ExecutionResult, LaunchError};

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifies one run, so a result that arrives after a reset can be told apart.
pub type RunId = Uuid;

/// "Put the caret here", emitted when the user activates a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRequest {
    pub line: usize,
    pub column: usize,
}

impl CursorRequest {
    /// Character offset of this request inside `text`, clamped to its bounds.
    pub fn resolve(&self, text: &str) -> usize {
        offset_for(text, self.line, self.column)
    }
}

impl From<&DiagnosticLocation> for CursorRequest {
    fn from(loc: &DiagnosticLocation) -> Self {
        Self {
            line: loc.line,
            column: loc.column,
        }
    }
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// The script ran and exited non-zero.
    Script {
        output: String,
        exit_code: i32,
        location: Option<DiagnosticLocation>,
    },
    /// The script could not be run at all.
    Launch { reason: String },
    /// The configured timeout expired and the interpreter was killed.
    TimedOut { after: Duration },
}

impl RunFailure {
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Self::Script { output, .. } => Cow::Borrowed(output),
            Self::Launch { reason } => Cow::Borrowed(reason),
            Self::TimedOut { after } => {
                Cow::Owned(format!("script did not finish within {}s", after.as_secs()))
            }
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Script { exit_code, .. } => Some(*exit_code),
            Self::Launch { .. } | Self::TimedOut { .. } => None,
        }
    }

    pub fn location(&self) -> Option<&DiagnosticLocation> {
        match self {
            Self::Script { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// True when the user should hear "could not run" rather than "your script is wrong".
    pub fn is_launch_failure(&self) -> bool {
        !matches!(self, Self::Script { .. })
    }

    fn from_launch_error(err: LaunchError) -> Self {
        match err {
            LaunchError::TimedOut { after } => Self::TimedOut { after },
            other => Self::Launch {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded {
        output: String,
        exit_code: i32,
    },
    Failed(RunFailure),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Every state except `Running` accepts a new run.
    pub fn can_run(&self) -> bool {
        !self.is_running()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Owns the live [`RunState`] and enforces which transitions are legal.
///
/// Purely synchronous: whoever drives the executor feeds results back in
/// through [`RunStateMachine::complete`].
#[derive(Debug)]
pub struct RunStateMachine {
    state: RunState,
    current_run: Option<RunId>,
    snapshot: Option<Arc<str>>,
    pending_cursor: Option<CursorRequest>,
    grammar: Arc<dyn DiagnosticGrammar>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new(Arc::new(CompilerLineGrammar::kotlin_script().clone()))
    }
}

impl RunStateMachine {
    pub fn new(grammar: Arc<dyn DiagnosticGrammar>) -> Self {
        Self {
            state: RunState::Idle,
            current_run: None,
            snapshot: None,
            pending_cursor: None,
            grammar,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Id of the run in flight, if any.
    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    /// The buffer text the most recent run was started with.
    pub fn snapshot(&self) -> Option<&Arc<str>> {
        self.snapshot.as_ref()
    }

    /// Move to `Running`. Returns `None` and changes nothing if a run is
    /// already in flight.
    pub fn begin_run(&mut self, snapshot: Arc<str>) -> Option<RunId> {
        if self.state.is_running() {
            tracing::debug!("Run request ignored: already running");
            return None;
        }

        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, chars = snapshot.chars().count(), "Run started");

        self.state = RunState::Running;
        self.current_run = Some(run_id);
        self.snapshot = Some(snapshot);
        self.pending_cursor = None;
        Some(run_id)
    }

    /// Apply the executor's result for `run_id`. Results for any other run,
    /// or arriving when nothing is running, are dropped. Returns whether the
    /// state changed.
    pub fn complete(
        &mut self,
        run_id: RunId,
        outcome: Result<ExecutionResult, LaunchError>,
    ) -> bool {
        if !self.state.is_running() || self.current_run != Some(run_id) {
            tracing::warn!(%run_id, "Dropping stale run result");
            return false;
        }

        self.current_run = None;
        self.state = match outcome {
            Ok(ExecutionResult::Success { output, exit_code }) => {
                RunState::Succeeded { output, exit_code }
            }
            Ok(ExecutionResult::Failure { output, exit_code }) => {
                let location = self.grammar.parse(&output);
                if location.is_none() {
                    tracing::debug!(exit_code, "Failure output has no recognised diagnostic");
                }
                RunState::Failed(RunFailure::Script {
                    output,
                    exit_code,
                    location,
                })
            }
            Err(err) => {
                tracing::warn!(%run_id, error = %err, "Run could not be launched");
                RunState::Failed(RunFailure::from_launch_error(err))
            }
        };

        tracing::debug!(%run_id, state = self.state.label(), "Run finished");
        true
    }

    /// The executor for `run_id` went away without a result. The run ends as
    /// a launch failure carrying `reason`.
    pub fn abandon(&mut self, run_id: RunId, reason: impl Into<String>) -> bool {
        if !self.state.is_running() || self.current_run != Some(run_id) {
            return false;
        }

        let reason = reason.into();
        tracing::error!(%run_id, %reason, "Run abandoned");
        self.current_run = None;
        self.state = RunState::Failed(RunFailure::Launch { reason });
        true
    }

    /// Back to `Idle` from anywhere, forgetting the snapshot and any pending
    /// cursor request.
    pub fn reset(&mut self) {
        self.state = RunState::Idle;
        self.current_run = None;
        self.snapshot = None;
        self.pending_cursor = None;
    }

    /// Queue a cursor request for the failed run's diagnostic. Only possible
    /// when the last run failed with a parsed location; the state is left as
    /// is. The request itself is handed out by [`Self::take_cursor_request`].
    pub fn activate_diagnostic(&mut self) -> bool {
        let RunState::Failed(failure) = &self.state else {
            return false;
        };
        let Some(location) = failure.location() else {
            return false;
        };

        self.pending_cursor = Some(CursorRequest::from(location));
        true
    }

    /// Hand the pending cursor request to the editor. Yields it once, then
    /// `None` until the diagnostic is activated again.
    pub fn take_cursor_request(&mut self) -> Option<CursorRequest> {
        self.pending_cursor.take()
    }
}
