//! Polling loop for command outcomes, optionally woken by file events.
//!
//! The store's directory is watched rather than the file itself: writers
//! replace the file by rename, which would orphan a watch on the old
//! inode. Events only shorten a sleep; the poll interval still bounds it,
//! so a missing or broken watch changes latency, never correctness.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace};

use crate::model::Command;
use crate::storage::CommandStore;

/// How a wait ended.
pub(super) enum Wait {
    Resolved(Command),

    /// `store_readable` is false when no read of the store ever succeeded.
    TimedOut { store_readable: bool },
}

/// Re-reads `store` until command `id` is terminal or `timeout` passes.
pub(super) fn wait_until_terminal(
    store: &CommandStore,
    id: &str,
    timeout: Duration,
    poll_interval: Duration,
    watch: bool,
) -> Wait {
    let started = Instant::now();
    // Armed before the first read so a write racing it still wakes us.
    let mut waker = Waker::new(store.path(), watch);
    let mut store_readable = false;

    loop {
        match store.find(id) {
            Ok(Some(command)) if command.status.is_terminal() => {
                debug!(%id, status = ?command.status, "command resolved");
                return Wait::Resolved(command);
            }
            Ok(found) => {
                store_readable = true;
                if found.is_none() {
                    trace!(%id, "command not visible yet");
                }
            }
            Err(e) => debug!(%id, error = %e, "transient store read failure"),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Wait::TimedOut { store_readable };
        }
        waker.sleep(poll_interval.min(timeout - elapsed));
    }
}

/// Sleeps between polls, returning early when the store file changes.
struct Waker {
    // Kept alive for as long as `events` is read; dropping it ends events.
    _watcher: Option<RecommendedWatcher>,
    events: Option<Receiver<()>>,
}

impl Waker {
    fn new(store_path: &Path, enabled: bool) -> Self {
        if !enabled {
            return Self::polling();
        }
        match watch_store(store_path) {
            Ok((watcher, events)) => Self {
                _watcher: Some(watcher),
                events: Some(events),
            },
            Err(e) => {
                debug!(error = %e, "file watch unavailable, polling only");
                Self::polling()
            }
        }
    }

    fn polling() -> Self {
        Self {
            _watcher: None,
            events: None,
        }
    }

    fn sleep(&mut self, duration: Duration) {
        let Some(events) = &self.events else {
            thread::sleep(duration);
            return;
        };
        match events.recv_timeout(duration) {
            Ok(()) => {
                // Coalesce a burst of events into one re-read.
                while events.try_recv().is_ok() {}
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("file watch ended, polling only");
                self.events = None;
                thread::sleep(duration);
            }
        }
    }
}

fn watch_store(store_path: &Path) -> notify::Result<(RecommendedWatcher, Receiver<()>)> {
    let dir = match store_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = store_path.file_name().map(ToOwned::to_owned);
    let (tx, rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let Ok(event) = event else {
            return;
        };
        let touches_store = event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref());
        if touches_store {
            let _ = tx.send(());
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::model::Outcome;

    #[test]
    fn watch_wakes_sleep_early() {
        let dir = TempDir::new().unwrap();
        let store = CommandStore::new(dir.path().join("console-commands.json"));
        let mut waker = Waker::new(store.path(), true);
        if waker.events.is_none() {
            // No watch backend in this environment; nothing to assert.
            return;
        }

        let writer_store = store.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            writer_store.append(&Command::pending("x")).unwrap();
        });

        let started = Instant::now();
        waker.sleep(Duration::from_secs(5));

        assert!(started.elapsed() < Duration::from_secs(4));
        writer.join().unwrap();
    }

    #[test]
    fn unrelated_files_do_not_wake() {
        let dir = TempDir::new().unwrap();
        let store = CommandStore::new(dir.path().join("console-commands.json"));
        let mut waker = Waker::new(store.path(), true);
        if waker.events.is_none() {
            return;
        }

        std::fs::write(dir.path().join("other.txt"), "hi").unwrap();

        let started = Instant::now();
        waker.sleep(Duration::from_millis(200));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn ended_watch_falls_back_to_sleeping() {
        let (tx, rx) = mpsc::channel();
        drop(tx);
        let mut waker = Waker {
            _watcher: None,
            events: Some(rx),
        };

        let started = Instant::now();
        waker.sleep(Duration::from_millis(50));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(waker.events.is_none());

        let started = Instant::now();
        waker.sleep(Duration::from_millis(50));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn resolved_before_first_poll_returns_immediately() {
        let dir = TempDir::new().unwrap();
        let store = CommandStore::new(dir.path().join("console-commands.json"));
        let command = Command::pending("1");
        store.append(&command).unwrap();
        store
            .resolve(&command.id, Outcome::Completed(json!(1)))
            .unwrap();

        let wait = wait_until_terminal(
            &store,
            &command.id,
            Duration::from_secs(5),
            Duration::from_secs(1),
            false,
        );

        assert!(matches!(wait, Wait::Resolved(c) if c.result == Some(json!(1))));
    }

    #[test]
    fn missing_store_times_out_as_readable() {
        let dir = TempDir::new().unwrap();
        let store = CommandStore::new(dir.path().join("absent.json"));

        let wait = wait_until_terminal(
            &store,
            "cmd_0_x",
            Duration::from_millis(50),
            Duration::from_millis(10),
            false,
        );

        assert!(matches!(wait, Wait::TimedOut { store_readable: true }));
    }
}
