#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub filter_input: String,
    pub filter_status: String,
    /// Styling hint: true once the input is long enough to filter.
    pub filter_active: bool,
    pub download_enabled: bool,
    pub status_message: String,
    pub running: bool,
    pub dirty: bool,
}
