//! File-backed command store shared with the browser executor.
//!
//! The store is one JSON array on disk:
//!
//! ```text
//! <dir>/
//!   console-commands.json        # the queue, rewritten whole on every change
//!   console-commands.json.lock   # present while this crate is writing
//!   .console-commands.json.*     # staged rewrite, renamed over the queue
//! ```
//!
//! Two processes rewrite the file: this crate appends commands and the
//! executor resolves them. Every rewrite is staged in a temporary file and
//! renamed into place, so a reader sees either the old array or the new
//! one. Writers from this crate also hold the lock file, and re-check the
//! file right before the rename to catch an executor write that landed in
//! between.

mod commands;
mod lock;

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::Command;

use lock::StoreLock;

/// How long to wait for the lock file before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Attempts at a read-modify-write before reporting a conflict.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Pause between attempts when the file is unreadable mid-update.
const REREAD_DELAY: Duration = Duration::from_millis(20);

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command {0} already reached a terminal status")]
    AlreadyTerminal(String),

    #[error("timed out waiting for store lock at {}", .0.display())]
    LockTimeout(PathBuf),

    #[error("store at {} kept changing during update", .0.display())]
    Conflict(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// The command queue file and how to write it safely.
#[derive(Debug, Clone)]
pub struct CommandStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl CommandStore {
    /// A store backed by the file at `path`.
    ///
    /// Nothing is touched on disk until the first write; a missing file
    /// reads as an empty queue.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the queue file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every command in the store.
    ///
    /// # Errors
    ///
    /// I/O failures other than a missing file, and content that doesn't
    /// parse. Either can be a writer caught mid-update, so pollers treat
    /// them as transient.
    pub fn load(&self) -> Result<Vec<Command>> {
        match self.read_raw()? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Applies `update` to the current collection and writes the result
    /// back atomically.
    ///
    /// `update` may run more than once: if the file changes between the
    /// read and the rename, the work is redone against the fresh content.
    fn modify<T>(&self, mut update: impl FnMut(&mut Vec<Command>) -> Result<T>) -> Result<T> {
        fs::create_dir_all(self.dir())?;
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_timeout)?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let snapshot = self.read_raw()?;
            let last_attempt = attempt == MAX_WRITE_ATTEMPTS;

            let mut commands = match parse_for_update(snapshot.as_deref(), last_attempt) {
                Ok(commands) => commands,
                Err(e) if !last_attempt => {
                    debug!(error = %e, attempt, "store unreadable, retrying");
                    thread::sleep(REREAD_DELAY);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let out = update(&mut commands)?;
            let staged = self.stage(&commands)?;

            if self.read_raw()? != snapshot {
                debug!(attempt, "store changed during update, recomputing");
                continue;
            }

            staged.persist(&self.path)?;
            return Ok(out);
        }

        warn!(path = %self.path.display(), "giving up on contended store update");
        Err(StorageError::Conflict(self.path.clone()))
    }

    /// Writes `commands` to a temporary file next to the store.
    fn stage(&self, commands: &[Command]) -> Result<NamedTempFile> {
        let prefix = format!(".{}.", self.file_name());
        let mut staged = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(self.dir())?;
        serde_json::to_writer_pretty(&mut staged, commands)?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }

    /// Raw file bytes, or `None` when the file doesn't exist.
    fn read_raw(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "commands".into(), |n| n.to_string_lossy().into_owned())
    }

    fn lock_path(&self) -> PathBuf {
        self.dir().join(format!("{}.lock", self.file_name()))
    }
}

/// Parses a snapshot taken for an update.
///
/// A blank file may be a writer that truncated and hasn't written yet, so
/// it only counts as an empty queue once retries are exhausted.
fn parse_for_update(snapshot: Option<&[u8]>, last_attempt: bool) -> Result<Vec<Command>> {
    let Some(bytes) = snapshot else {
        return Ok(Vec::new());
    };
    if last_attempt && bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}
