//! Backup Hamster engine: storage, the assets page surface, the bridge
//! between surfaces and the timed workflow driver.
mod bridge;
mod content;
mod decode;
mod download;
mod driver;
mod page;
mod persist;
mod records;
mod scanner;
mod store;

pub use bridge::{Bridge, BridgeError, DEFAULT_REQUEST_TIMEOUT};
pub use content::ContentService;
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use download::{DownloadError, DownloadTarget, Downloader};
pub use driver::{WorkflowDriver, WorkflowEvent};
pub use page::{Anchor, AssetsPage, HtmlAssetsPage, PageError, PageRow};
pub use persist::{ensure_dir, write_atomic, AtomicFileWriter, PersistError};
pub use records::{
    ensure_initialized, load_last_filter, save_last_filter, HistoryStore, Preferences,
    HISTORY_KEY, LAST_FILTER_KEY, PREFERENCES_KEY,
};
pub use scanner::{filter_rows, row_state, scan};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
