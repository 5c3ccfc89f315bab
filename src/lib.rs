//! Drive a live browser session through a shared command file.
//!
//! The controller appends commands to a JSON queue; a browser-resident
//! executor evaluates them and writes outcomes back into the same file.
//! [`Bridge`] is the usual entry point.

pub mod bridge;
pub mod config;
pub mod logs;
pub mod model;
pub mod script;
pub mod storage;

pub use bridge::{Bridge, BridgeError, ElementInfo};
pub use config::Config;
pub use model::{Command, CommandStatus, LogEntry, LogKind, LogSnapshot, Outcome};
pub use storage::{CommandStore, StorageError};
