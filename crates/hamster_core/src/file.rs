use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::RowState;

/// Sentinel used when a row has no recorded download date.
pub const NEVER_DOWNLOADED: &str = "never";

/// One file row scanned from the assets page.
///
/// Holds identifiers only. The clickable anchor is resolved again from `id`
/// whenever the workflow needs to act on the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date_updated: String,
    #[serde(default = "never", deserialize_with = "null_as_never")]
    pub last_downloaded: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub href: String,
    /// Row state observed when the entry was scanned.
    #[serde(default)]
    pub status: RowState,
}

fn never() -> String {
    NEVER_DOWNLOADED.to_string()
}

// Pages without a date cell send `null` for it.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_never<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(never))
}

impl FileEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date_updated: String::new(),
            last_downloaded: never(),
            href: String::new(),
            status: RowState::Idle,
        }
    }

    /// True when the page reports no previous download for this row.
    pub fn never_downloaded(&self) -> bool {
        let value = self.last_downloaded.trim();
        value.is_empty() || value.eq_ignore_ascii_case(NEVER_DOWNLOADED)
    }
}

/// Normalizes the "last downloaded" cell text, mapping blanks to [`NEVER_DOWNLOADED`].
pub fn normalize_last_downloaded(cell_text: &str) -> String {
    let trimmed = cell_text.trim();
    if trimmed.is_empty() {
        never()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadHistoryRecord {
    pub title: String,
    pub last_downloaded: DateTime<Utc>,
}

/// Download history keyed by row id. Grows without bound; a new run
/// overwrites the records of the files it touched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHistory(BTreeMap<String, DownloadHistoryRecord>);

impl DownloadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&DownloadHistoryRecord> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DownloadHistoryRecord)> {
        self.0.iter()
    }

    /// Stamps every file of the batch with `at`, replacing older records.
    pub fn record_batch(&mut self, files: &[FileEntry], at: DateTime<Utc>) {
        for file in files {
            self.0.insert(
                file.id.clone(),
                DownloadHistoryRecord {
                    title: file.title.clone(),
                    last_downloaded: at,
                },
            );
        }
    }
}

/// Decides whether a row should go through the workflow again.
///
/// Rows already in flight always qualify, as do rows without history. A row
/// with history qualifies only if the page reports an update after the
/// recorded download. Dates that cannot be parsed never count as newer.
pub fn needs_download(entry: &FileEntry, history: &DownloadHistory) -> bool {
    if matches!(entry.status, RowState::Personalizing | RowState::Ready) {
        return true;
    }
    let Some(record) = history.get(&entry.id) else {
        return true;
    };
    match parse_vendor_date(&entry.date_updated) {
        Some(updated) => updated > record.last_downloaded,
        None => false,
    }
}

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%Y-%m-%d"];
const DATE_TIME_FORMATS: &[&str] = &[
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses the vendor's date cell text. Accepts RFC 3339 and a handful of
/// US-style layouts; dates without a time are taken as midnight UTC.
pub fn parse_vendor_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}
