use crate::WorkflowOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the filter input box.
    FilterInputChanged(String),
    /// Last-used filter loaded from storage when the popup opens.
    RestoreLastFilter(String),
    /// Debounce timer fired for the given input generation.
    DebounceElapsed { generation: u64 },
    /// Page surface answered a `filterFiles` request.
    FilterApplied { filter: String, visible_count: usize },
    /// Page surface could not be reached for a `filterFiles` request.
    FilterFailed { filter: String, reason: String },
    /// User clicked Download. A zero delay falls back to the default.
    DownloadClicked { delay_seconds: u64 },
    /// Progress line from the workflow driver or the page surface.
    WorkflowStatus(String),
    WorkflowFinished(WorkflowOutcome),
}
