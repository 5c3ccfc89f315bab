//! Output formatting for CLI display.

use serde::Serialize;

use console_relay::{Command, CommandStatus};

/// Longest code excerpt shown in a listing.
const CODE_PREVIEW_CHARS: usize = 60;

/// One listing line: `<id>  [<status>]  <code preview>`.
pub(super) fn format_command_line(command: &Command) -> String {
    let status = match command.status {
        CommandStatus::Pending => "pending",
        CommandStatus::Completed => "completed",
        CommandStatus::Error => "error",
    };
    format!("{}  [{status}]  {}", command.id, preview(&command.code))
}

/// First line of `code`, clipped to [`CODE_PREVIEW_CHARS`].
fn preview(code: &str) -> String {
    let trimmed = code.trim();
    let first = trimmed.lines().next().unwrap_or_default();
    let clipped: String = first.chars().take(CODE_PREVIEW_CHARS).collect();
    if clipped.len() < trimmed.len() {
        format!("{clipped}…")
    } else {
        clipped
    }
}

/// The last `n` items, or all of them.
pub(super) fn tail<T>(items: &[T], n: Option<usize>) -> &[T] {
    match n {
        Some(n) if n < items.len() => &items[items.len() - n..],
        _ => items,
    }
}

pub(super) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize output: {e}"))
}
