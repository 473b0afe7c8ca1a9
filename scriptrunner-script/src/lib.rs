use async_trait::async_trait;
use std::io::{Read, Write};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

mod group;
pub mod interpreter;

use group::GroupGuard;

pub use interpreter::InterpreterConfig;

/// Outcome of a script that actually ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success { output: String, exit_code: i32 },
    Failure { output: String, exit_code: i32 },
}

impl ExecutionResult {
    pub fn from_exit(output: String, exit_code: i32) -> Self {
        if exit_code == 0 {
            Self::Success { output, exit_code }
        } else {
            Self::Failure { output, exit_code }
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Success { output, .. } | Self::Failure { output, .. } => output,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { exit_code, .. } | Self::Failure { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The script never got to run (or never finished), as opposed to a script
/// that ran and exited non-zero.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("interpreter `{program}` not found: {source}")]
    InterpreterNotFound {
        program: String,
        source: which::Error,
    },

    #[error("could not write script file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("could not read interpreter output: {0}")]
    Capture(#[source] std::io::Error),

    #[error("script did not finish within {}s", .after.as_secs())]
    TimedOut { after: Duration },
}

/// Anything that can turn a script body into an [`ExecutionResult`].
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, script: &str) -> Result<ExecutionResult, LaunchError>;
}

/// Runs scripts through an external interpreter process.
#[derive(Debug, Clone, Default)]
pub struct InterpreterExecutor {
    config: InterpreterConfig,
}

impl InterpreterExecutor {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }
}

#[async_trait]
impl ScriptExecutor for InterpreterExecutor {
    async fn execute(&self, script: &str) -> Result<ExecutionResult, LaunchError> {
        execute_script(script, &self.config).await
    }
}

/// Executes a script body with the configured interpreter and waits for it.
///
/// The body is written to a fresh temporary file which is removed when this
/// function returns, on every path. Stdout and stderr come back as one
/// merged string.
pub async fn execute_script(
    script: &str,
    config: &InterpreterConfig,
) -> Result<ExecutionResult, LaunchError> {
    let interpreter =
        which::which(&config.program).map_err(|source| LaunchError::InterpreterNotFound {
            program: config.program.clone(),
            source,
        })?;

    let script_file = persist_script(script, config)?;

    // stdout and stderr share one pipe, so the interleaving is kept.
    let (reader, writer) = std::io::pipe().map_err(LaunchError::Capture)?;
    let writer_err = writer.try_clone().map_err(LaunchError::Capture)?;

    let mut command = config.command(&interpreter, script_file.path());
    command
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_err)
        .kill_on_drop(true);
    group::isolate(&mut command);

    tracing::info!(
        interpreter = %interpreter.display(),
        script = %script_file.path().display(),
        "Launching script"
    );
    let started = Instant::now();

    let spawned = command.spawn();
    // The command still owns our copies of the write end; EOF needs them closed.
    drop(command);
    let mut child = spawned.map_err(|source| LaunchError::Spawn {
        program: config.program.clone(),
        source,
    })?;
    let mut group = GroupGuard::leading(&child);

    let capture = tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut captured = Vec::new();
        reader.read_to_end(&mut captured).map(|_| captured)
    });

    let run = async {
        let status = child.wait().await.map_err(LaunchError::Capture)?;
        let captured = capture
            .await
            .map_err(|e| LaunchError::Capture(std::io::Error::other(e)))?
            .map_err(LaunchError::Capture)?;
        Ok::<_, LaunchError>((captured, status))
    };

    // On timeout (or when this future is dropped) `group` kills the tree.
    let (captured, status) = match config.timeout() {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| LaunchError::TimedOut { after: limit })??,
        None => run.await?,
    };
    group.disarm();

    let exit_code = exit_code(status);
    tracing::debug!(
        exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Script finished"
    );

    drop(script_file);

    let output = String::from_utf8_lossy(&captured).into_owned();
    Ok(ExecutionResult::from_exit(output, exit_code))
}

fn persist_script(script: &str, config: &InterpreterConfig) -> Result<NamedTempFile, LaunchError> {
    let suffix = format!(".{}", config.extension);
    let mut file = tempfile::Builder::new()
        .prefix(&config.temp_prefix)
        .suffix(&suffix)
        .tempfile()
        .map_err(LaunchError::TempFile)?;

    file.write_all(script.as_bytes())
        .map_err(LaunchError::TempFile)?;
    file.flush().map_err(LaunchError::TempFile)?;
    Ok(file)
}

/// Exit status as a shell would report it: signals map to `128 + signo`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
