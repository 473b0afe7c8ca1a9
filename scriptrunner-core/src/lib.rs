pub mod buffer;
pub mod config;
pub mod engine;
pub mod runtime;
pub mod state_machine;

// Re-export the main struct so users can just use `scriptrunner_core::RunController`
pub use engine::RunController;

// Re-export the simpler types for the UI
pub use buffer::ScriptBuffer;
pub use config::{ConfigError, RunnerConfig};
pub use runtime::{parse_diagnostic, DiagnosticLocation};
pub use state_machine::{CursorRequest, RunFailure, RunId, RunState, RunStateMachine};

pub use scriptrunner_script::{ExecutionResult, LaunchError};
