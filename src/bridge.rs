//! The controller side of the protocol: submit commands, wait for the
//! executor to resolve them, and turn outcomes into results.

mod helpers;
mod wait;

use std::time::Duration;

use jiff::SignedDuration;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{Command, Outcome};
use crate::storage::{CommandStore, StorageError};

pub use helpers::ElementInfo;

/// Default pause between store reads while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest pause between store reads; shorter intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors surfaced to callers of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The command was still pending when the deadline passed.
    #[error(
        "command {id} timed out after {}ms{}",
        .timeout.as_millis(),
        readability_note(.store_readable)
    )]
    Timeout {
        id: String,
        timeout: Duration,
        store_readable: bool,
    },

    /// The executor reported that the script threw.
    #[error("command {id} failed: {message}")]
    Execution { id: String, message: String },

    /// The script returned something other than the expected shape.
    #[error("unexpected result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, BridgeError>;

fn readability_note(store_readable: &bool) -> &'static str {
    if *store_readable {
        ""
    } else {
        " (command store was never readable)"
    }
}

/// Submits commands to a store and waits on their outcomes.
#[derive(Debug, Clone)]
pub struct Bridge {
    store: CommandStore,
    poll_interval: Duration,
    watch: bool,
    retention: Option<SignedDuration>,
}

impl Bridge {
    #[must_use]
    pub fn new(store: CommandStore) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            watch: true,
            retention: None,
        }
    }

    /// Pause between store reads, at least [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Whether to wake early on filesystem events while waiting.
    #[must_use]
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Drop terminal commands older than `max_age` whenever submitting.
    #[must_use]
    pub fn with_retention(mut self, max_age: Option<SignedDuration>) -> Self {
        self.retention = max_age;
        self
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn store(&self) -> &CommandStore {
        &self.store
    }

    /// Queues `code` for the executor and returns the new command's id.
    ///
    /// # Errors
    ///
    /// Any failure writing the store. The write is not retried.
    pub fn submit(&self, code: &str) -> Result<String> {
        let command = Command::pending(code);
        match self.retention {
            Some(max_age) => {
                let removed = self.store.append_with_retention(&command, max_age)?;
                if removed > 0 {
                    info!(removed, "dropped expired commands");
                }
            }
            None => self.store.append(&command)?,
        }
        debug!(id = %command.id, "submitted command");
        Ok(command.id)
    }

    /// Blocks until command `id` leaves pending or `timeout` elapses.
    ///
    /// Unreadable or missing store content and an id that isn't visible
    /// yet all count as "still pending".
    ///
    /// # Errors
    ///
    /// [`BridgeError::Timeout`] when the deadline passes first.
    pub fn wait_for_result(&self, id: &str, timeout: Duration) -> Result<Command> {
        let wait =
            wait::wait_until_terminal(&self.store, id, timeout, self.poll_interval, self.watch);
        match wait {
            wait::Wait::Resolved(command) => Ok(command),
            wait::Wait::TimedOut { store_readable } => {
                warn!(%id, timeout_ms = timeout.as_millis(), store_readable, "command timed out");
                Err(BridgeError::Timeout {
                    id: id.to_string(),
                    timeout,
                    store_readable,
                })
            }
        }
    }

    /// Submits `code`, waits for it, and returns what it evaluated to.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Execution`] when the executor reports an error, plus
    /// everything [`Bridge::submit`] and [`Bridge::wait_for_result`] return.
    pub fn run(&self, code: &str, timeout: Duration) -> Result<Value> {
        let id = self.submit(code)?;
        let command = self.wait_for_result(&id, timeout)?;
        match command.outcome() {
            Some(Outcome::Completed(value)) => Ok(value),
            Some(Outcome::Failed(message)) => Err(BridgeError::Execution { id, message }),
            None => unreachable!("wait_for_result only returns terminal commands"),
        }
    }
}
