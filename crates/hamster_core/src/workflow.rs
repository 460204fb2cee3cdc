use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pause between two phases that do not wait on the vendor.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How long the driver waits between the personalize and ready phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadyWait {
    /// `files × delay_seconds`.
    #[default]
    PerFile,
    Fixed { seconds: u64 },
    /// Re-scan until no file of the batch is idle, or give up at the timeout.
    Poll { interval_ms: u64, timeout_seconds: u64 },
}

impl ReadyWait {
    /// Upper bound of the wait for a batch of `file_count` files.
    pub fn budget(&self, file_count: usize, delay_seconds: u64) -> Duration {
        match *self {
            Self::PerFile => {
                Duration::from_secs((file_count as u64).saturating_mul(delay_seconds))
            }
            Self::Fixed { seconds } => Duration::from_secs(seconds),
            Self::Poll {
                timeout_seconds, ..
            } => Duration::from_secs(timeout_seconds),
        }
    }
}

impl fmt::Display for ReadyWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerFile => write!(f, "per-file"),
            Self::Fixed { seconds } => write!(f, "fixed:{seconds}"),
            Self::Poll {
                interval_ms,
                timeout_seconds,
            } => write!(f, "poll:{interval_ms}:{timeout_seconds}"),
        }
    }
}

impl FromStr for ReadyWait {
    type Err = String;

    /// Accepts `per-file`, `fixed:SECONDS` and `poll:INTERVAL_MS:TIMEOUT_SECONDS`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.trim().split(':');
        let kind = parts.next().unwrap_or_default();
        let mut number = |name: &str| -> Result<u64, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {name} in {raw:?}"))?
                .parse::<u64>()
                .map_err(|err| format!("bad {name} in {raw:?}: {err}"))
        };
        let wait = match kind {
            "per-file" => Self::PerFile,
            "fixed" => Self::Fixed {
                seconds: number("seconds")?,
            },
            "poll" => {
                let interval_ms = number("interval")?;
                let timeout_seconds = number("timeout")?;
                if interval_ms == 0 {
                    return Err(format!("poll interval must be positive in {raw:?}"));
                }
                Self::Poll {
                    interval_ms,
                    timeout_seconds,
                }
            }
            other => return Err(format!("unknown wait policy {other:?}")),
        };
        Ok(wait)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    pub filter: String,
    pub delay_seconds: u64,
    pub ready_wait: ReadyWait,
    pub skip_unchanged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    NoFiles,
    Completed { files: usize },
    Failed { reason: String },
}

/// Offset of the `position`-th click (1-based) from the start of its phase.
pub fn click_offset(delay_seconds: u64, position: usize) -> Duration {
    Duration::from_secs(delay_seconds).saturating_mul(position as u32)
}

pub mod status {
    //! Status lines shown to the user while the workflow runs.

    pub const SCANNING: &str = "Scanning for files to download...";
    pub const NO_FILES: &str = "No files found to download.";
    pub const SETTING_READY: &str = "Setting files to ready state...";
    pub const TRIGGERING: &str = "Triggering downloads for all files...";
    pub const STARTING: &str = "Starting download process...";

    pub fn found(count: usize) -> String {
        format!("Found {count} files to download.")
    }

    pub fn initializing(count: usize) -> String {
        format!("Initializing personalization for {count} files...")
    }

    pub fn waiting(seconds: u64) -> String {
        format!("Waiting {seconds} seconds for personalization to complete...")
    }

    pub fn personalizing(title: &str, n: usize, total: usize) -> String {
        format!("Personalizing {title}... ({n}/{total})")
    }

    pub fn completed(count: usize) -> String {
        format!("Download process completed for {count} files!")
    }

    pub fn failed(reason: &str) -> String {
        format!("Download process stopped: {reason}")
    }
}
