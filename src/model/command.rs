//! Command: a unit of requested script evaluation and its outcome.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Length of the random suffix in a command id.
const ID_SUFFIX_LEN: usize = 9;

/// A script evaluation request as stored in the command file.
///
/// Serialized with camelCase keys so the browser-side executor can read
/// and rewrite records without a translation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Unique within a store: `cmd_<unix millis>_<random hex>`.
    pub id: String,

    /// Script text handed to the executor untouched.
    pub code: String,

    /// When the command was created. Never changes.
    #[serde(alias = "timestamp")]
    pub created_at: Timestamp,

    pub status: CommandStatus,

    /// Set by the executor on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Set by the executor on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Fields the executor attached that this crate doesn't model.
    /// Carried through rewrites so they survive.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a command stands. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,

    #[serde(alias = "executed")]
    Completed,

    Error,
}

impl CommandStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The terminal result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The script evaluated to this value.
    Completed(Value),

    /// The script threw; the message is whatever the executor reported.
    Failed(String),
}

impl Command {
    /// Creates a pending command for `code`, stamped now.
    #[must_use]
    pub fn pending(code: impl Into<String>) -> Self {
        let created_at = Timestamp::now();
        Self {
            id: generate_id(created_at),
            code: code.into(),
            created_at,
            status: CommandStatus::Pending,
            result: None,
            error: None,
            extra: Map::new(),
        }
    }

    /// Moves the command into the terminal state described by `outcome`.
    ///
    /// Callers check [`CommandStatus::is_terminal`] first; this only
    /// keeps `result` and `error` mutually exclusive.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed(value) => {
                self.status = CommandStatus::Completed;
                self.result = Some(value);
                self.error = None;
            }
            Outcome::Failed(message) => {
                self.status = CommandStatus::Error;
                self.result = None;
                self.error = Some(message);
            }
        }
    }

    /// The terminal view of this command, or `None` while pending.
    ///
    /// A completed command with no result yields `null`; an errored
    /// command with no message yields a generic one.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            CommandStatus::Pending => None,
            CommandStatus::Completed => {
                Some(Outcome::Completed(self.result.clone().unwrap_or(Value::Null)))
            }
            CommandStatus::Error => Some(Outcome::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "executor reported an error without a message".into()),
            )),
        }
    }
}

/// Builds `cmd_<millis>_<suffix>`. The suffix is cut from a v4 UUID, so
/// ids minted within the same millisecond still differ.
fn generate_id(at: Timestamp) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("cmd_{}_{}", at.as_millisecond(), &random[..ID_SUFFIX_LEN])
}
