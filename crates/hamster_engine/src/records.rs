//! Typed views over the key-value store: download history, the last-used
//! filter and the preferences blob.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hamster_core::{DownloadHistory, FileEntry};
use hamster_logging::hamster_info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::store::{KeyValueStore, StoreError};

pub const HISTORY_KEY: &str = "downloadHistory";
pub const LAST_FILTER_KEY: &str = "lastFilter";
/// Namespaced key holding the serialized preferences blob.
pub const PREFERENCES_KEY: &str = "backupHamsterData";

#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<DownloadHistory, StoreError> {
        match self.store.get(HISTORY_KEY).await? {
            Some(value) => decode(HISTORY_KEY, value),
            None => Ok(DownloadHistory::new()),
        }
    }

    /// Stamps every file of the batch with `at` and writes the history back.
    pub async fn record_batch(
        &self,
        files: &[FileEntry],
        at: DateTime<Utc>,
    ) -> Result<DownloadHistory, StoreError> {
        let mut history = self.load().await?;
        history.record_batch(files, at);
        self.store.set(HISTORY_KEY, encode(HISTORY_KEY, &history)?).await?;
        Ok(history)
    }
}

/// Creates an empty history on first use. Returns whether it did.
pub async fn ensure_initialized(store: &dyn KeyValueStore) -> Result<bool, StoreError> {
    if store.get(HISTORY_KEY).await?.is_some() {
        return Ok(false);
    }
    store
        .set(HISTORY_KEY, encode(HISTORY_KEY, &DownloadHistory::new())?)
        .await?;
    hamster_info!("Initialized empty download history");
    Ok(true)
}

pub async fn load_last_filter(store: &dyn KeyValueStore) -> Result<Option<String>, StoreError> {
    match store.get(LAST_FILTER_KEY).await? {
        Some(Value::String(filter)) if !filter.is_empty() => Ok(Some(filter)),
        Some(Value::String(_)) | None => Ok(None),
        Some(other) => Err(StoreError::Malformed {
            key: LAST_FILTER_KEY.to_string(),
            message: format!("expected a string, found {other}"),
        }),
    }
}

pub async fn save_last_filter(store: &dyn KeyValueStore, filter: &str) -> Result<(), StoreError> {
    store
        .set(LAST_FILTER_KEY, Value::String(filter.to_string()))
        .await
}

/// Free-text preferences edited on the options surface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub setting1: String,
    #[serde(default)]
    pub setting2: String,
}

impl Preferences {
    /// The blob is stored as a JSON-encoded string, not a nested object.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, StoreError> {
        let Some(value) = store.get(PREFERENCES_KEY).await? else {
            return Ok(None);
        };
        let Value::String(blob) = value else {
            return Err(StoreError::Malformed {
                key: PREFERENCES_KEY.to_string(),
                message: "expected a JSON string".to_string(),
            });
        };
        serde_json::from_str(&blob)
            .map(Some)
            .map_err(|err| StoreError::Malformed {
                key: PREFERENCES_KEY.to_string(),
                message: err.to_string(),
            })
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let blob = serde_json::to_string(self).map_err(|err| StoreError::Encode {
            key: PREFERENCES_KEY.to_string(),
            message: err.to_string(),
        })?;
        store.set(PREFERENCES_KEY, Value::String(blob)).await
    }

    pub async fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(PREFERENCES_KEY).await
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|err| StoreError::Malformed {
        key: key.to_string(),
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Encode {
        key: key.to_string(),
        message: err.to_string(),
    })
}
