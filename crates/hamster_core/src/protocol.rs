//! Messages exchanged between the popup surface and the page surface.
//!
//! Wire format: JSON objects discriminated by an `action` field, with
//! camelCase payload fields.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FileEntry;

/// Delay used when a request omits `delaySeconds`.
pub const DEFAULT_DELAY_SECONDS: u64 = 5;

fn default_delay() -> u64 {
    DEFAULT_DELAY_SECONDS
}

/// Request sent from the popup surface to the page surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Scan the page, returning the files that pass the filter.
    FindDownloadableFiles {
        #[serde(default)]
        filter: String,
    },
    /// Show or hide rows and report how many remain visible.
    FilterFiles {
        #[serde(default)]
        filter: String,
    },
    /// First click: start vendor-side personalization.
    InitializePersonalization {
        files: Vec<FileEntry>,
        #[serde(default = "default_delay")]
        delay_seconds: u64,
    },
    /// Second click: acknowledge finished personalization.
    SetFilesToReady {
        files: Vec<FileEntry>,
        #[serde(default = "default_delay")]
        delay_seconds: u64,
    },
    /// Third click: download.
    DownloadAllFiles {
        files: Vec<FileEntry>,
        #[serde(default = "default_delay")]
        delay_seconds: u64,
    },
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Self::FindDownloadableFiles { .. } => "findDownloadableFiles",
            Self::FilterFiles { .. } => "filterFiles",
            Self::InitializePersonalization { .. } => "initializePersonalization",
            Self::SetFilesToReady { .. } => "setFilesToReady",
            Self::DownloadAllFiles { .. } => "downloadAllFiles",
        }
    }

    /// Parses and validates a request at the process boundary.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        let request: Self = serde_json::from_str(raw)?;
        if let Self::InitializePersonalization { files, .. }
        | Self::SetFilesToReady { files, .. }
        | Self::DownloadAllFiles { files, .. } = &request
        {
            if let Some(file) = files.iter().find(|file| file.id.trim().is_empty()) {
                return Err(ProtocolError::Invalid(format!(
                    "file {:?} has an empty id",
                    file.title
                )));
            }
        }
        Ok(request)
    }
}

/// Acknowledgement strings for the click phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    PersonalizationStarted,
    SetToReady,
    DownloadsTriggered,
}

/// Reply from the page surface. The variant is implied by the field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Files {
        files: Vec<FileEntry>,
    },
    VisibleCount {
        #[serde(rename = "visibleCount")]
        visible_count: usize,
    },
    Status { status: ActionStatus },
}

/// Unsolicited message from the page surface back to the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    UpdateStatus { message: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(String),
    #[error("unexpected response to {action}")]
    UnexpectedResponse { action: &'static str },
}
