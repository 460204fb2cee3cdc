//! Backup Hamster core: data model, filtering, phase inference, the
//! popup/page message protocol and the pure popup state machine.
mod effect;
mod file;
mod filter;
mod msg;
mod phase;
pub mod protocol;
mod state;
mod update;
mod view_model;
pub mod workflow;

pub use effect::{Effect, FILTER_DEBOUNCE};
pub use file::{
    needs_download, normalize_last_downloaded, parse_vendor_date, DownloadHistory,
    DownloadHistoryRecord, FileEntry, NEVER_DOWNLOADED,
};
pub use filter::{matches_filter, FilterQuery, MIN_FILTER_LEN};
pub use msg::Msg;
pub use phase::{
    is_personalizer_link, RowState, WorkflowPhase, PERSONALIZER_HREF_MARKER,
    PERSONALIZING_INDICATORS, READY_INDICATORS,
};
pub use protocol::{
    ActionStatus, Notification, ProtocolError, Request, Response, DEFAULT_DELAY_SECONDS,
};
pub use state::AppState;
pub use update::update;
pub use view_model::AppViewModel;
pub use workflow::{click_offset, ReadyWait, WorkflowOutcome, WorkflowRequest};
