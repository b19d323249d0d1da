//! Thread title derivation.

/// Longest thread name the chat platform accepts, in characters.
pub const MAX_THREAD_TITLE_CHARS: usize = 100;
const TRUNCATION_MARKER: &str = "...";
const SUMMARY_SEPARATOR: &str = " - ";

/// `Task {key} - {summary}`, shortened to [`MAX_THREAD_TITLE_CHARS`].
pub fn derive_thread_title(task_key: &str, summary: &str) -> String {
    truncate_title(&format!("Task {task_key}{SUMMARY_SEPARATOR}{summary}"))
}

/// Cuts on character boundaries and ends the result with `...` when shortened.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_THREAD_TITLE_CHARS {
        return title.to_string();
    }
    let keep = MAX_THREAD_TITLE_CHARS - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Text after the first `" - "` of a thread name, or `""` when absent.
pub fn summary_from_thread_name(name: &str) -> &str {
    name.split_once(SUMMARY_SEPARATOR)
        .map(|(_, summary)| summary)
        .unwrap_or("")
}
