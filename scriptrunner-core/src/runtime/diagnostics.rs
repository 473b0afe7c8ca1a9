//! Compiler diagnostic extraction.
//!
//! The interpreter reports errors as
//! `<path>.<ext>:<line>:<column>: error: <message>`. Only the first such line
//! is used. The path is a throwaway temp file, so it is never shown: labels
//! use [`SCRIPT_LABEL`] instead.

use regex::Regex;
use std::fmt::Debug;
use std::sync::OnceLock;

/// Logical name shown in place of the temporary script path.
pub const SCRIPT_LABEL: &str = "script";

static KTS_GRAMMAR: OnceLock<CompilerLineGrammar> = OnceLock::new();

/// A single parsed error location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLocation {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl DiagnosticLocation {
    /// `script:<line>:<column>: error: <message>`
    pub fn label(&self) -> String {
        format!(
            "{}:{}:{}: error: {}",
            SCRIPT_LABEL, self.line, self.column, self.message
        )
    }
}

/// Turns raw interpreter output into at most one location.
///
/// Implementations must not fail: text they do not recognise yields `None`.
pub trait DiagnosticGrammar: Debug + Send + Sync {
    fn parse(&self, text: &str) -> Option<DiagnosticLocation>;
}

/// `<anything>.<ext>:<line>:<column>: error: <message>`, one line.
#[derive(Debug, Clone)]
pub struct CompilerLineGrammar {
    pattern: Regex,
}

impl CompilerLineGrammar {
    pub fn new(extension: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"(?m)^.*\.{}:(\d+):(\d+): error: (.*)$",
            regex::escape(extension)
        );
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }

    /// The `.kts` grammar, built once.
    pub fn kotlin_script() -> &'static Self {
        KTS_GRAMMAR.get_or_init(|| Self::new("kts").expect("Invalid kts diagnostic regex"))
    }
}

impl DiagnosticGrammar for CompilerLineGrammar {
    fn parse(&self, text: &str) -> Option<DiagnosticLocation> {
        let caps = self.pattern.captures(text)?;

        let line = caps[1].parse::<usize>().ok().filter(|n| *n >= 1)?;
        let column = caps[2].parse::<usize>().ok().filter(|n| *n >= 1)?;
        let message = caps[3].trim_end_matches('\r').to_string();

        Some(DiagnosticLocation {
            line,
            column,
            message,
        })
    }
}

/// Parse with the default `.kts` grammar.
pub fn parse_diagnostic(text: &str) -> Option<DiagnosticLocation> {
    CompilerLineGrammar::kotlin_script().parse(text)
}
