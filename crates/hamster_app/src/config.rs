use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hamster_core::{ReadyWait, DEFAULT_DELAY_SECONDS};
use hamster_engine::DEFAULT_REQUEST_TIMEOUT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{Cli, Commands};
use crate::logging::LogDestination;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "hamster.ron";
const DEFAULT_STORE_FILE: &str = "hamster_store.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file backing the key-value store.
    pub store_path: PathBuf,
    pub delay_seconds: u64,
    pub ready_wait: ReadyWait,
    pub skip_unchanged: bool,
    pub log_destination: LogDestination,
    pub request_timeout_seconds: u64,
    pub download_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            delay_seconds: DEFAULT_DELAY_SECONDS,
            ready_wait: ReadyWait::PerFile,
            skip_unchanged: false,
            log_destination: LogDestination::File,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            download_timeout_seconds: 60,
        }
    }
}

impl AppConfig {
    /// Loads `explicit`, or `hamster.ron` if present, or the defaults.
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(content)
    }

    /// Command-line flags win over file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(store) = &cli.store {
            self.store_path = store.clone();
        }
        if let Some(destination) = cli.log {
            self.log_destination = destination;
        }
        if let Commands::Run {
            delay,
            wait,
            skip_unchanged,
            ..
        } = &cli.command
        {
            if let Some(delay) = delay {
                self.delay_seconds = *delay;
            }
            if let Some(wait) = wait {
                self.ready_wait = *wait;
            }
            if *skip_unchanged {
                self.skip_unchanged = true;
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::parse(
            "(delay_seconds: 2, ready_wait: Poll(interval_ms: 500, timeout_seconds: 90))",
        )
        .unwrap();
        assert_eq!(config.delay_seconds, 2);
        assert_eq!(
            config.ready_wait,
            ReadyWait::Poll {
                interval_ms: 500,
                timeout_seconds: 90
            }
        );
        assert_eq!(config.store_path, PathBuf::from("hamster_store.json"));
        assert_eq!(config.log_destination, LogDestination::File);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope.ron");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn bad_file_reports_parse_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("hamster.ron");
        fs::write(&path, "(delay_seconds: \"soon\")").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut config = AppConfig::parse("(delay_seconds: 2, skip_unchanged: false)").unwrap();
        let cli = Cli::parse_from([
            "hamster",
            "--store",
            "other.json",
            "run",
            "--page",
            "assets.html",
            "--filter",
            "box set",
            "--delay",
            "7",
            "--wait",
            "fixed:61",
            "--skip-unchanged",
        ]);
        config.apply_cli(&cli);

        assert_eq!(config.store_path, PathBuf::from("other.json"));
        assert_eq!(config.delay_seconds, 7);
        assert_eq!(config.ready_wait, ReadyWait::Fixed { seconds: 61 });
        assert!(config.skip_unchanged);
    }
}
