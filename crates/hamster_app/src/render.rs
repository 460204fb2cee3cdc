use hamster_core::AppViewModel;

/// Terminal lines for the parts of the view that changed since `previous`.
pub fn render(previous: &AppViewModel, view: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();
    if view.filter_status != previous.filter_status {
        let marker = if view.filter_active { "*" } else { "-" };
        lines.push(format!("[filter {marker}] {}", view.filter_status));
    }
    if view.download_enabled != previous.download_enabled {
        let state = if view.download_enabled {
            "enabled"
        } else {
            "disabled"
        };
        lines.push(format!("[download] {state}"));
    }
    if view.status_message != previous.status_message && !view.status_message.is_empty() {
        lines.push(format!("[status] {}", view.status_message));
    }
    lines
}
