//! Log snapshot reader.
//!
//! The snapshot is written by the instrumentation plugin, on its own
//! schedule. Logs are diagnostic, so every read favours answering over
//! validating: a missing file or one that doesn't parse yields no entries.

use std::{fs, io, path::Path};

use tracing::debug;

use crate::model::{LogEntry, LogKind, LogSnapshot};

/// Reads the whole snapshot. Missing or malformed files read as empty.
#[must_use]
pub fn read_snapshot(path: &Path) -> LogSnapshot {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return LogSnapshot::default(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "log snapshot unreadable");
            return LogSnapshot::default();
        }
    };
    LogSnapshot::from_json(&text).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "log snapshot malformed");
        LogSnapshot::default()
    })
}

/// Browser console entries.
#[must_use]
pub fn read_console_logs(path: &Path) -> Vec<LogEntry> {
    of_kind(path, LogKind::Console)
}

/// Monitoring entries carrying at least one error-level item. Each match
/// is returned whole, not just the offending item.
#[must_use]
pub fn read_errors(path: &Path) -> Vec<LogEntry> {
    read_snapshot(path)
        .logs
        .into_iter()
        .filter(LogEntry::is_error_report)
        .collect()
}

/// The plugin's record of command results as they came back.
#[must_use]
pub fn read_command_results(path: &Path) -> Vec<LogEntry> {
    of_kind(path, LogKind::CommandResult)
}

fn of_kind(path: &Path, kind: LogKind) -> Vec<LogEntry> {
    read_snapshot(path)
        .logs
        .into_iter()
        .filter(|entry| entry.kind == kind)
        .collect()
}
