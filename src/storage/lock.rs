//! Advisory lock file serializing writers from this crate.
//!
//! The lock is a sibling file created with create-new semantics; whoever
//! creates it owns the store until the guard drops. A lock left behind by
//! a crashed process is broken once it is older than [`STALE_AFTER`].
//! Breaking happens under a second `<lock>.break` file and re-checks the
//! age there, so two writers that saw the same stale lock cannot both
//! remove it and end up holding the store together.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    process, thread,
    time::{Duration, Instant},
};

use tracing::warn;

use super::{Result, StorageError};

/// Age after which a lock file is assumed abandoned.
const STALE_AFTER: Duration = Duration::from_secs(10);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Held while a write is in progress. Removes the lock file on drop.
#[derive(Debug)]
pub(super) struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Creates the lock file, waiting up to `timeout` for a current holder.
    pub(super) fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let mut broke_stale = false;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(mut file) => {
                    // Holder pid is informational only.
                    let _ = writeln!(file, "{}", process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !broke_stale && is_stale(path) {
                        match break_stale(path) {
                            Ok(true) => {
                                warn!(path = %path.display(), "broke stale store lock");
                                broke_stale = true;
                                continue;
                            }
                            Ok(false) => {}
                            Err(e) => {
                                warn!(
                                    path = %path.display(),
                                    error = %e,
                                    "failed to break stale store lock"
                                );
                                broke_stale = true;
                            }
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(StorageError::LockTimeout(path.to_path_buf()));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

/// Removes the lock at `path` if it is still stale once the break guard
/// is held. Returns whether it was removed.
fn break_stale(path: &Path) -> io::Result<bool> {
    let guard_path = break_guard_path(path);
    let _guard = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&guard_path)
    {
        Ok(_) => StoreLock { path: guard_path },
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            // Only a crash mid-break leaves the guard behind.
            if is_stale(&guard_path) {
                let _ = fs::remove_file(&guard_path);
            }
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    if !is_stale(path) {
        return Ok(false);
    }
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn break_guard_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".break");
    PathBuf::from(name)
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_AFTER)
}
