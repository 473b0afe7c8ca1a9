//! Conversions between 1-based (line, column) pairs and flat character offsets.
//!
//! Offsets count Unicode scalar values, not bytes. Lines are split on `\n`
//! only and every break counts as one character, so a `\r` before it is just
//! part of the line. Nothing here fails: out-of-range input is clamped.

/// 0-based character offset of `(line, column)` in `text`, clamped to
/// `[0, chars(text)]`.
pub fn offset_for(text: &str, line: usize, column: usize) -> usize {
    let total = text.chars().count();

    let before: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|segment| segment.chars().count() + 1)
        .sum();

    before.saturating_add(column.saturating_sub(1)).min(total)
}

/// 1-based `(line, column)` of a character offset. Offsets past the end land
/// just after the last character.
pub fn position_for(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;

    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

/// Byte index of a character offset, for slicing. Clamped to `text.len()`.
pub fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}
