//! Runner configuration.
//!
//! Layers, lowest first: built-in defaults, `<config dir>/config.json`,
//! an explicit file, then `SCRIPTRUNNER_*` environment variables. The
//! front-end applies its own flags on top.

use crate::runtime::diagnostics::CompilerLineGrammar;

use directories::ProjectDirs;
use scriptrunner_script::InterpreterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const ENV_INTERPRETER: &str = "SCRIPTRUNNER_INTERPRETER";
pub const ENV_TIMEOUT_SECS: &str = "SCRIPTRUNNER_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("unusable script extension {extension:?}: {source}")]
    Extension {
        extension: String,
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub interpreter: InterpreterConfig,
}

impl RunnerConfig {
    /// `~/.config/scriptrunner/config.json` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "scriptrunner").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the effective config. An explicit path replaces the default
    /// file and must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_from(|var| std::env::var(var).ok())?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Apply `SCRIPTRUNNER_*` overrides looked up through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_INTERPRETER).filter(|p| !p.trim().is_empty()) {
            self.interpreter.program = program.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout {
                    var: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
            self.interpreter.timeout_secs = Some(secs);
        }

        Ok(())
    }

    pub fn diagnostic_grammar(&self) -> Result<CompilerLineGrammar, ConfigError> {
        CompilerLineGrammar::new(&self.interpreter.extension).map_err(|source| {
            ConfigError::Extension {
                extension: self.interpreter.extension.clone(),
                source,
            }
        })
    }
}
