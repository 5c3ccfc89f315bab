//! Command operations: append, find, resolve, and compact.

use jiff::{SignedDuration, Timestamp};
use tracing::debug;

use crate::model::{Command, Outcome};

use super::{CommandStore, Result, StorageError};

impl CommandStore {
    /// Appends a command to the end of the queue.
    ///
    /// # Errors
    ///
    /// Lock, I/O, or parse failures while rewriting the file.
    pub fn append(&self, command: &Command) -> Result<()> {
        self.modify(|commands| {
            commands.push(command.clone());
            Ok(())
        })
    }

    /// Appends a command and, in the same rewrite, drops terminal commands
    /// created more than `max_age` before now.
    ///
    /// Returns how many commands were dropped.
    ///
    /// # Errors
    ///
    /// Lock, I/O, or parse failures while rewriting the file.
    pub fn append_with_retention(
        &self,
        command: &Command,
        max_age: SignedDuration,
    ) -> Result<usize> {
        let now = Timestamp::now();
        self.modify(|commands| {
            let removed = drop_expired(commands, now, max_age);
            commands.push(command.clone());
            Ok(removed)
        })
    }

    /// Looks up a command by id.
    ///
    /// # Errors
    ///
    /// Same as [`CommandStore::load`].
    pub fn find(&self, id: &str) -> Result<Option<Command>> {
        Ok(self.load()?.into_iter().find(|c| c.id == id))
    }

    /// Records the outcome of a pending command. This is the executor's
    /// half of the protocol.
    ///
    /// # Errors
    ///
    /// [`StorageError::CommandNotFound`] for an unknown id,
    /// [`StorageError::AlreadyTerminal`] if the command already finished,
    /// or a failure rewriting the file.
    pub fn resolve(&self, id: &str, outcome: Outcome) -> Result<Command> {
        self.modify(|commands| {
            let command = commands
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| StorageError::CommandNotFound(id.to_string()))?;
            if command.status.is_terminal() {
                return Err(StorageError::AlreadyTerminal(id.to_string()));
            }
            command.apply(outcome.clone());
            Ok(command.clone())
        })
    }

    /// Drops terminal commands created more than `max_age` ago.
    ///
    /// Pending commands are always kept. Returns how many were dropped.
    ///
    /// # Errors
    ///
    /// Lock, I/O, or parse failures while rewriting the file.
    pub fn compact(&self, max_age: SignedDuration) -> Result<usize> {
        let now = Timestamp::now();
        self.modify(|commands| Ok(drop_expired(commands, now, max_age)))
    }
}

fn drop_expired(commands: &mut Vec<Command>, now: Timestamp, max_age: SignedDuration) -> usize {
    let before = commands.len();
    commands.retain(|c| !c.status.is_terminal() || now.duration_since(c.created_at) <= max_age);
    let removed = before - commands.len();
    if removed > 0 {
        debug!(removed, "compacted expired commands");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::model::CommandStatus;

    fn test_store() -> (TempDir, CommandStore) {
        let dir = TempDir::new().unwrap();
        let store = CommandStore::new(dir.path().join("console-commands.json"));
        (dir, store)
    }

    fn aged(code: &str, seconds_ago: i64) -> Command {
        let mut command = Command::pending(code);
        command.created_at = Timestamp::now() - SignedDuration::from_secs(seconds_ago);
        command
    }

    #[test]
    fn append_and_find() {
        let (_dir, store) = test_store();
        let command = Command::pending("1+1");

        store.append(&command).unwrap();
        let found = store.find(&command.id).unwrap().unwrap();

        assert_eq!(found.status, CommandStatus::Pending);
        assert_eq!(found.code, "1+1");
    }

    #[test]
    fn append_preserves_order() {
        let (_dir, store) = test_store();
        for code in ["a", "b", "c"] {
            store.append(&Command::pending(code)).unwrap();
        }

        let codes: Vec<String> = store.load().unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, ["a", "b", "c"]);
    }

    #[test]
    fn append_to_existing_empty_array() {
        let (_dir, store) = test_store();
        std::fs::write(store.path(), "[]").unwrap();

        store.append(&Command::pending("1+1")).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn find_unknown_id_is_none() {
        let (_dir, store) = test_store();
        store.append(&Command::pending("x")).unwrap();

        assert!(store.find("cmd_0_nope").unwrap().is_none());
    }

    #[test]
    fn resolve_completes_pending_command() {
        let (_dir, store) = test_store();
        let command = Command::pending("6*7");
        store.append(&command).unwrap();

        let resolved = store
            .resolve(&command.id, Outcome::Completed(json!(42)))
            .unwrap();

        assert_eq!(resolved.status, CommandStatus::Completed);
        let found = store.find(&command.id).unwrap().unwrap();
        assert_eq!(found.result, Some(json!(42)));
        assert_eq!(found.created_at, command.created_at);
    }

    #[test]
    fn resolve_terminal_command_fails() {
        let (_dir, store) = test_store();
        let command = Command::pending("x");
        store.append(&command).unwrap();
        store
            .resolve(&command.id, Outcome::Failed("boom".into()))
            .unwrap();

        let err = store
            .resolve(&command.id, Outcome::Completed(json!(1)))
            .unwrap_err();

        assert!(matches!(err, StorageError::AlreadyTerminal(_)));
        let found = store.find(&command.id).unwrap().unwrap();
        assert_eq!(found.error.as_deref(), Some("boom"));
    }

    #[test]
    fn resolve_unknown_command_fails() {
        let (_dir, store) = test_store();
        let err = store
            .resolve("cmd_0_nope", Outcome::Completed(json!(1)))
            .unwrap_err();

        assert!(matches!(err, StorageError::CommandNotFound(_)));
    }

    #[test]
    fn compact_drops_only_old_terminal_commands() {
        let (_dir, store) = test_store();
        let old_done = aged("old done", 7200);
        let old_pending = aged("old pending", 7200);
        let fresh_done = aged("fresh done", 10);
        for c in [&old_done, &old_pending, &fresh_done] {
            store.append(c).unwrap();
        }
        store
            .resolve(&old_done.id, Outcome::Completed(json!(null)))
            .unwrap();
        store
            .resolve(&fresh_done.id, Outcome::Completed(json!(null)))
            .unwrap();

        let removed = store.compact(SignedDuration::from_secs(3600)).unwrap();

        assert_eq!(removed, 1);
        let codes: Vec<String> = store.load().unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, ["old pending", "fresh done"]);
    }

    #[test]
    fn append_with_retention_compacts_in_same_write() {
        let (_dir, store) = test_store();
        let old = aged("old", 7200);
        store.append(&old).unwrap();
        store
            .resolve(&old.id, Outcome::Failed("boom".into()))
            .unwrap();

        let new = Command::pending("new");
        let removed = store
            .append_with_retention(&new, SignedDuration::from_secs(3600))
            .unwrap();

        assert_eq!(removed, 1);
        let commands = store.load().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].id, new.id);
    }
}
