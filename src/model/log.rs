//! Log entries captured by the browser instrumentation plugin.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One diagnostic record from the log snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,

    /// Shape depends on `kind`. Monitoring entries carry an `items` list.
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// What produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    /// Browser console activity.
    Console,

    /// An error-monitoring envelope. Older plugins tag these `sentry`.
    #[serde(alias = "sentry")]
    Monitoring,

    /// The plugin's echo of a command result.
    CommandResult,

    /// Anything newer than this crate knows about.
    #[serde(other)]
    Other,
}

impl LogEntry {
    /// Whether this is a monitoring entry with at least one error-level item.
    #[must_use]
    pub fn is_error_report(&self) -> bool {
        if self.kind != LogKind::Monitoring {
            return false;
        }
        self.data
            .get("items")
            .and_then(Value::as_array)
            .is_some_and(|items| {
                items.iter().any(|item| {
                    item.pointer("/body/level").and_then(Value::as_str) == Some("error")
                })
            })
    }
}

/// The full contents of a log snapshot file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSnapshot {
    /// Present when the plugin runs in session mode.
    pub session_id: Option<String>,

    pub logs: Vec<LogEntry>,
}

/// On-disk shapes: session mode wraps the entries, plain mode doesn't.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Session {
        #[serde(rename = "sessionId", default)]
        session_id: Option<String>,
        logs: Vec<LogEntry>,
    },
    Plain(Vec<LogEntry>),
}

impl LogSnapshot {
    /// Parses either snapshot layout.
    ///
    /// # Errors
    ///
    /// Fails when the text is not JSON or matches neither layout.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        Ok(match serde_json::from_str(text)? {
            SnapshotFile::Session { session_id, logs } => Self { session_id, logs },
            SnapshotFile::Plain(logs) => Self {
                session_id: None,
                logs,
            },
        })
    }
}
