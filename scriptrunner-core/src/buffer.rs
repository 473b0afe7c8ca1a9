//! The editable script text plus caret.
//!
//! The caret is a character offset, always kept within `[0, chars(text)]`.

use crate::runtime::offset::{char_to_byte, offset_for, position_for};
use crate::state_machine::CursorRequest;

use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBuffer {
    text: String,
    caret: usize,
}

impl ScriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caret ends up after the last character.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut buffer = Self::default();
        buffer.set_text(text);
        buffer
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// 1-based `(line, column)` of the caret.
    pub fn caret_position(&self) -> (usize, usize) {
        position_for(&self.text, self.caret)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.caret = self.char_len();
    }

    /// Append `line` plus a newline at the end of the buffer.
    pub fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.caret = self.char_len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    /// Move the caret to a diagnostic location. The buffer may have been
    /// edited since the run, so the location is clamped, not trusted.
    pub fn apply_cursor_request(&mut self, request: CursorRequest) -> usize {
        self.caret = request.resolve(&self.text);
        self.caret
    }

    /// Immutable copy for a run.
    pub fn snapshot(&self) -> Arc<str> {
        Arc::from(self.text.as_str())
    }

    /// The line the caret is on, without its newline.
    pub fn caret_line(&self) -> &str {
        let (line, _) = self.caret_position();
        let start = char_to_byte(&self.text, offset_for(&self.text, line, 1));
        self.text[start..].split('\n').next().unwrap_or("")
    }
}
