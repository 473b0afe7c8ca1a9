use crate::config::{ConfigError, RunnerConfig};
use crate::runtime::diagnostics::DiagnosticGrammar;
use crate::state_machine::{CursorRequest, RunId, RunState, RunStateMachine};

use scriptrunner_script::{ExecutionResult, InterpreterExecutor, LaunchError, ScriptExecutor};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

type Completion = (RunId, Result<ExecutionResult, LaunchError>);

/// The single owner of the run state.
/// The front-end holds one instance of this and drives it with
/// run / reset / activate-diagnostic.
///
/// Runs execute on the tokio runtime; their results come back over a channel
/// and are only applied here, so the state is never touched concurrently.
pub struct RunController {
    machine: RunStateMachine,
    executor: Arc<dyn ScriptExecutor>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("machine", &self.machine)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

impl RunController {
    pub fn new(executor: Arc<dyn ScriptExecutor>, grammar: Arc<dyn DiagnosticGrammar>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            machine: RunStateMachine::new(grammar),
            executor,
            completion_tx,
            completion_rx,
            in_flight: None,
        }
    }

    /// Interpreter executor plus the diagnostic grammar for its extension.
    pub fn from_config(config: &RunnerConfig) -> Result<Self, ConfigError> {
        let grammar = config.diagnostic_grammar()?;
        let executor = InterpreterExecutor::new(config.interpreter.clone());
        Ok(Self::new(Arc::new(executor), Arc::new(grammar)))
    }

    pub fn state(&self) -> &RunState {
        self.machine.state()
    }

    /// Start running `snapshot`. Returns `false` (and does nothing) while a
    /// run is already in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_run(&mut self, snapshot: impl Into<Arc<str>>) -> bool {
        let snapshot: Arc<str> = snapshot.into();
        let Some(run_id) = self.machine.begin_run(snapshot.clone()) else {
            return false;
        };

        let executor = self.executor.clone();
        let tx = self.completion_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = executor.execute(&snapshot).await;
            // Receiver lives as long as the controller.
            let _ = tx.send((run_id, outcome));
        }));
        true
    }

    /// Back to `Idle`. A run still in flight is aborted; dropping its task
    /// kills the interpreter process.
    pub fn request_reset(&mut self) {
        if let Some(task) = self.in_flight.take() {
            if !task.is_finished() {
                tracing::info!("Reset during run: aborting interpreter");
            }
            task.abort();
        }
        self.machine.reset();
    }

    pub fn activate_diagnostic(&mut self) -> bool {
        self.machine.activate_diagnostic()
    }

    pub fn take_cursor_request(&mut self) -> Option<CursorRequest> {
        self.machine.take_cursor_request()
    }

    /// Wait until the current run (if any) has finished and return the
    /// resulting state. Returns immediately when nothing is running.
    ///
    /// A run whose task dies without reporting (a panicking executor) ends
    /// as a launch failure instead of hanging here.
    ///
    /// Cancel-safe: dropping the future never loses a result.
    pub async fn next_completion(&mut self) -> RunState {
        while self.machine.state().is_running() {
            tokio::select! {
                biased;

                received = self.completion_rx.recv() => match received {
                    Some((run_id, outcome)) => {
                        self.apply(run_id, outcome);
                    }
                    None => break,
                },

                joined = join_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    if let Err(err) = joined {
                        self.reap(err);
                    }
                }
            }
        }
        self.machine.state().clone()
    }

    /// The run task ended with a `JoinError`. Anything it sent is applied
    /// first.
    fn reap(&mut self, err: JoinError) {
        while let Ok((run_id, outcome)) = self.completion_rx.try_recv() {
            self.apply(run_id, outcome);
        }
        if let Some(run_id) = self.machine.current_run() {
            self.machine
                .abandon(run_id, format!("script runner task failed: {}", err));
        }
    }

    fn apply(&mut self, run_id: RunId, outcome: Result<ExecutionResult, LaunchError>) -> bool {
        let changed = self.machine.complete(run_id, outcome);
        if changed {
            self.in_flight = None;
        }
        changed
    }
}

/// Resolves when the run task ends; never, when there is none.
async fn join_in_flight(task: &mut Option<JoinHandle<()>>) -> Result<(), JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}
