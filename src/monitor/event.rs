//! Session activity events.

use serde::{Deserialize, Serialize};

/// Longest error signature kept.
const MAX_SIGNATURE_CHARS: usize = 120;

/// One observed unit of session activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Lines of code written to a file.
    CodeWritten { file: String, lines: u32 },
    /// An error surfaced in the session.
    ErrorSeen { message: String },
    /// A file was edited.
    FileEdited { file: String },
    /// The user corrected the assistant.
    Correction,
    /// Context-window usage level, `0.0..=1.0`.
    ContextUsage { fraction: f64 },
}

/// Collapse an error message into a stable signature: first line,
/// lowercased, capped. Stack traces and timestamps vary between
/// occurrences; the head line is what repeats.
#[must_use]
pub fn error_signature(message: &str) -> String {
    message
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
        .chars()
        .take(MAX_SIGNATURE_CHARS)
        .collect()
}
