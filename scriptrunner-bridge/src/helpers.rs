//! Shared utility functions.
//!
//! Zero UI dependencies.

use std::path::Path;

// ────────────────────────────────────────────────────────────────
// Formatting
// ────────────────────────────────────────────────────────────────

pub fn format_duration_short(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        format!("{}h {}m", h, m)
    }
}

/// Shorten a path for the status line.
pub fn short_path(path: &Path) -> String {
    let path = path.display().to_string();
    if let Ok(home) = std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME")) {
        if home.len() > 1 {
            if let Some(rest) = path.strip_prefix(&home) {
                if rest.is_empty() || rest.starts_with(['/', '\\']) {
                    return format!("~{}", rest);
                }
            }
        }
    }
    if path.chars().count() > 40 {
        let tail: String = path
            .chars()
            .rev()
            .take(37)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{}", tail)
    } else {
        path
    }
}
