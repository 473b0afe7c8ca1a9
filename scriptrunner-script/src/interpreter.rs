use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// How to invoke the script interpreter.
///
/// The defaults match `kotlinc -script <file>.kts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Binary name or path, resolved on `PATH` at launch.
    pub program: String,
    /// Arguments placed between the interpreter and the script path.
    pub script_args: Vec<String>,
    /// Script file suffix, without the dot. Also the suffix diagnostics are matched on.
    pub extension: String,
    /// Prefix for the per-run temporary file name.
    pub temp_prefix: String,
    /// Kill the run after this many seconds. `None` (or 0) waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: "kotlinc".to_string(),
            script_args: vec!["-script".to_string()],
            extension: "kts".to_string(),
            temp_prefix: "temp_script".to_string(),
            timeout_secs: None,
        }
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// `[<interpreter>, <script_args>..., <script>]`
    pub fn invocation(&self, interpreter: &Path, script: &Path) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.script_args.len() + 2);
        argv.push(interpreter.as_os_str().to_owned());
        argv.extend(self.script_args.iter().map(OsString::from));
        argv.push(script.as_os_str().to_owned());
        argv
    }

    /// The interpreter command, without any stdio set up.
    pub(crate) fn command(&self, interpreter: &Path, script: &Path) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(interpreter);
        command.args(&self.script_args).arg(script);
        command
    }
}
