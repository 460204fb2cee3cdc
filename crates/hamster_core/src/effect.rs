use std::time::Duration;

/// Quiescence period before a filter edit is sent to the page.
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistLastFilter(String),
    /// Deliver `Msg::DebounceElapsed { generation }` after `delay`.
    ScheduleDebounce { generation: u64, delay: Duration },
    /// Send a `filterFiles` request; an empty filter makes every row visible.
    SendFilter(String),
    StartWorkflow { filter: String, delay_seconds: u64 },
}
