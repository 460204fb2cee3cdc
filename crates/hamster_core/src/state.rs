use crate::filter::MIN_FILTER_LEN;
use crate::view_model::AppViewModel;

/// Popup session state. Everything the event handlers share lives here,
/// including the debounce generation that replaces a global timer handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    filter_input: String,
    debounce_generation: u64,
    filter_status: String,
    filter_active: bool,
    status_message: String,
    running: bool,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            filter_input: String::new(),
            debounce_generation: 0,
            filter_status: too_short_status(0),
            filter_active: false,
            status_message: String::new(),
            running: false,
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            filter_input: self.filter_input.clone(),
            filter_status: self.filter_status.clone(),
            filter_active: self.filter_active,
            download_enabled: self.download_enabled(),
            status_message: self.status_message.clone(),
            running: self.running,
            dirty: self.dirty,
        }
    }

    pub fn filter_input(&self) -> &str {
        &self.filter_input
    }

    pub fn debounce_generation(&self) -> u64 {
        self.debounce_generation
    }

    pub fn filter_active(&self) -> bool {
        self.filter_active
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn download_enabled(&self) -> bool {
        self.filter_active && !self.running
    }

    /// Returns whether a render is pending and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Stores trimmed input and starts a new debounce generation.
    pub(crate) fn set_filter_input(&mut self, raw: &str) -> u64 {
        self.filter_input = raw.trim().to_string();
        self.debounce_generation += 1;
        let len = self.filter_input.chars().count();
        if len >= MIN_FILTER_LEN {
            self.filter_active = true;
            self.filter_status = format!("Filtering for: \"{}\"...", self.filter_input);
        } else {
            self.filter_active = false;
            self.filter_status = too_short_status(len);
        }
        self.dirty = true;
        self.debounce_generation
    }

    pub(crate) fn set_filter_result(&mut self, visible_count: usize) {
        self.filter_status = format!(
            "Showing {} files matching \"{}\"",
            visible_count, self.filter_input
        );
        self.dirty = true;
    }

    pub(crate) fn set_filter_failed(&mut self, reason: &str) {
        self.filter_status = format!("Could not filter for \"{}\": {reason}", self.filter_input);
        self.dirty = true;
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.dirty = true;
    }

    pub(crate) fn start_run(&mut self) {
        self.running = true;
        self.dirty = true;
    }

    pub(crate) fn finish_run(&mut self) {
        self.running = false;
        self.dirty = true;
    }
}

fn too_short_status(len: usize) -> String {
    format!("Please enter at least {MIN_FILTER_LEN} characters ({len}/{MIN_FILTER_LEN})")
}
