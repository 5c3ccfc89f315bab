//! Core data model for the relay.
//!
//! Two record families share the filesystem with outside processes:
//! commands, which this crate writes and the browser executor resolves,
//! and log entries, which an instrumentation plugin writes and this crate
//! only reads.

mod command;
mod log;

pub use command::{Command, CommandStatus, Outcome};
pub use log::{LogEntry, LogKind, LogSnapshot};
