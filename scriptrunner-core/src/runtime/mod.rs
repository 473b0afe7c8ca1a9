pub mod diagnostics;
pub mod offset;

pub use diagnostics::{
    parse_diagnostic, CompilerLineGrammar, DiagnosticGrammar, DiagnosticLocation, SCRIPT_LABEL,
};
pub use offset::{char_to_byte, offset_for, position_for};
