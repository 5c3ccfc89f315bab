//! Relay configuration.
//!
//! Loaded from `~/.console-relay/config.toml`. Every key is optional and a
//! missing file means defaults. The file paths can also come from
//! `CONSOLE_RELAY_COMMAND_FILE` and `CONSOLE_RELAY_LOG_FILE`, which beat
//! the file; command-line flags beat both.

use std::{env, fs, io, path::PathBuf, time::Duration};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::bridge::Bridge;
use crate::storage::CommandStore;

pub const COMMAND_FILE_ENV: &str = "CONSOLE_RELAY_COMMAND_FILE";
pub const LOG_FILE_ENV: &str = "CONSOLE_RELAY_LOG_FILE";

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// The command queue shared with the executor.
    pub command_file: PathBuf,

    /// The log snapshot written by the instrumentation plugin.
    pub log_file: PathBuf,

    /// Default wait per command.
    pub timeout_ms: u64,

    /// Pause between store reads while waiting. Raised to 1ms if lower.
    pub poll_interval_ms: u64,

    pub lock_timeout_ms: u64,

    /// Terminal commands older than this are dropped on submit.
    /// `0` keeps everything.
    pub retention_secs: u64,

    /// Wake waits on file events instead of only on the poll interval.
    pub watch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_file: PathBuf::from("./console-commands.json"),
            log_file: PathBuf::from("./sentry-console-logs.json"),
            timeout_ms: 5_000,
            poll_interval_ms: 100,
            lock_timeout_ms: 2_000,
            retention_secs: 3_600,
            watch: true,
        }
    }
}

impl Config {
    /// Load config from `~/.console-relay/config.toml`, then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a message naming the file when it exists but can't be read
    /// or parsed.
    pub fn load() -> Result<Self, String> {
        let mut config = match Self::path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific file. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// As [`Config::load`].
    pub fn load_from(path: &std::path::Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.console-relay/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".console-relay").join("config.toml"))
    }

    /// Applies non-empty values from `lookup` for the path variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(COMMAND_FILE_ENV).filter(|s| !s.is_empty()) {
            self.command_file = PathBuf::from(path);
        }
        if let Some(path) = lookup(LOG_FILE_ENV).filter(|s| !s.is_empty()) {
            self.log_file = PathBuf::from(path);
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn retention(&self) -> Option<SignedDuration> {
        if self.retention_secs == 0 {
            return None;
        }
        Some(SignedDuration::from_secs(
            i64::try_from(self.retention_secs).unwrap_or(i64::MAX),
        ))
    }

    /// A store for the configured command file.
    #[must_use]
    pub fn store(&self) -> CommandStore {
        CommandStore::new(&self.command_file)
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }

    /// A bridge wired with every configured knob.
    #[must_use]
    pub fn bridge(&self) -> Bridge {
        Bridge::new(self.store())
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_watch(self.watch)
            .with_retention(self.retention())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::bridge::MIN_POLL_INTERVAL;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "command-file = \"/tmp/q.json\"\ntimeout-ms = 250\nwatch = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.command_file, PathBuf::from("/tmp/q.json"));
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert!(!config.watch);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.log_file, PathBuf::from("./sentry-console-logs.json"));
    }

    #[test]
    fn invalid_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout-ms = \"soon\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.contains("config.toml"));
    }

    #[test]
    fn overrides_replace_paths() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            COMMAND_FILE_ENV => Some("/srv/commands.json".into()),
            LOG_FILE_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.command_file, PathBuf::from("/srv/commands.json"));
        // Empty values are ignored.
        assert_eq!(config.log_file, Config::default().log_file);
    }

    #[test]
    fn zero_poll_interval_does_not_spin() {
        let config: Config = toml::from_str("poll-interval-ms = 0").unwrap();
        assert_eq!(config.bridge().poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn zero_retention_disables_compaction() {
        let config = Config {
            retention_secs: 0,
            ..Config::default()
        };
        assert!(config.retention().is_none());
        assert_eq!(
            Config::default().retention(),
            Some(SignedDuration::from_secs(3600))
        );
    }
}
