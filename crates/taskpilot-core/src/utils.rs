//! Utility helpers — path resolution and string manipulation.

use std::path::PathBuf;

/// Get the Taskpilot data directory (e.g. `~/.taskpilot/`).
pub fn get_data_path() -> PathBuf {
    home_dir().join(".taskpilot")
}

/// Keep at most `max_chars` characters of `s`, without any marker.
/// Unicode-safe.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Sanitize a string for use as a filename or container name.
pub fn safe_filename(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Task id without its organization prefix (`acme/report-1` → `report-1`).
pub fn task_local_id(task_id: &str) -> &str {
    task_id.rsplit('/').next().unwrap_or(task_id)
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
