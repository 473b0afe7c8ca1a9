//! Command-line arguments.

use clap::Parser;
use scriptrunner_core::RunnerConfig;
use scriptrunner_core::config::ConfigError;

use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "scriptrunner", version, about = "Run scripts and jump to their errors")]
pub struct Cli {
    /// Script to load into the buffer.
    pub file: Option<PathBuf>,

    /// Start a line-oriented editing session instead of running once.
    #[arg(short, long)]
    pub interactive: bool,

    /// After a failed run, move the caret to the reported error.
    #[arg(short, long)]
    pub goto_error: bool,

    /// Config file to use instead of the default location.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Interpreter binary (overrides config and environment).
    #[arg(long, value_name = "BIN")]
    pub interpreter: Option<String>,

    /// Kill a run after this many seconds (0 disables).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Disable colored output (also honoured: `NO_COLOR`).
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Config file + environment, with flags applied last.
    pub fn resolve_config(&self) -> Result<RunnerConfig, ConfigError> {
        let mut config = RunnerConfig::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut RunnerConfig) {
        if let Some(program) = &self.interpreter {
            config.interpreter.program = program.clone();
        }
        if let Some(secs) = self.timeout {
            config.interpreter.timeout_secs = Some(secs);
        }
    }
}
