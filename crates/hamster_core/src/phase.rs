use serde::{Deserialize, Serialize};

/// Row text fragments the vendor renders while a file is being personalized.
pub const PERSONALIZING_INDICATORS: &[&str] = &["Personalizing", "Click link again in"];
/// Row text fragments the vendor renders once a file can be downloaded.
pub const READY_INDICATORS: &[&str] = &["Ready!", "Click again to download"];
/// Fragment of an anchor target that marks the on-demand personalization step.
pub const PERSONALIZER_HREF_MARKER: &str = "Personalizer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowPhase {
    Scanning,
    Personalizing,
    Ready,
    Downloading,
    Complete,
}

impl WorkflowPhase {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Scanning => Some(Self::Personalizing),
            Self::Personalizing => Some(Self::Ready),
            Self::Ready => Some(Self::Downloading),
            Self::Downloading => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

/// Processing state of a single row, inferred from its rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    #[default]
    Idle,
    Personalizing,
    Ready,
}

impl RowState {
    /// Ready indicators win over personalizing ones.
    pub fn from_row_text(text: &str) -> Self {
        if READY_INDICATORS.iter().any(|marker| text.contains(marker)) {
            Self::Ready
        } else if PERSONALIZING_INDICATORS
            .iter()
            .any(|marker| text.contains(marker))
        {
            Self::Personalizing
        } else {
            Self::Idle
        }
    }
}

pub fn is_personalizer_link(href: &str) -> bool {
    href.contains(PERSONALIZER_HREF_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_state_from_indicators() {
        assert_eq!(RowState::from_row_text("Bestiary  Never  Jan 1"), RowState::Idle);
        assert_eq!(
            RowState::from_row_text("Bestiary Personalizing... please wait"),
            RowState::Personalizing
        );
        assert_eq!(
            RowState::from_row_text("Bestiary Click link again in 20 seconds"),
            RowState::Personalizing
        );
        assert_eq!(RowState::from_row_text("Bestiary Ready!"), RowState::Ready);
        assert_eq!(
            RowState::from_row_text("Personalizing done. Click again to download"),
            RowState::Ready
        );
    }

    #[test]
    fn phases_advance_in_order() {
        let mut phase = WorkflowPhase::Scanning;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            seen.push(next);
            phase = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&WorkflowPhase::Complete));
    }
}
