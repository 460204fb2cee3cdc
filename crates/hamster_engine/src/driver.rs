//! Popup-side workflow: scan, personalize, ready, download.
//!
//! The driver never observes clicks completing. It dispatches each phase to
//! the page surface and waits a policy-defined time before the next one.
use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use hamster_core::{
    is_personalizer_link, needs_download, workflow::status, workflow::SETTLE_DELAY, FileEntry,
    ReadyWait, Request, RowState, WorkflowOutcome, WorkflowPhase, WorkflowRequest,
};
use hamster_logging::{hamster_debug, hamster_error, hamster_info, hamster_warn};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::bridge::{Bridge, BridgeError};
use crate::records::HistoryStore;

/// Stand-in for deadlines too far out to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + offset`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(start: Instant, offset: Duration) -> Instant {
    start
        .checked_add(offset)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Phase(WorkflowPhase),
    Status(String),
    Finished(WorkflowOutcome),
}

pub struct WorkflowDriver {
    bridge: Bridge,
    history: HistoryStore,
    events: mpsc::UnboundedSender<WorkflowEvent>,
}

impl WorkflowDriver {
    pub fn new(
        bridge: Bridge,
        history: HistoryStore,
        events: mpsc::UnboundedSender<WorkflowEvent>,
    ) -> Self {
        Self {
            bridge,
            history,
            events,
        }
    }

    /// Runs the whole workflow. Bridge failures end the run early; storage
    /// failures are logged and do not.
    pub async fn run(&self, request: WorkflowRequest) -> WorkflowOutcome {
        let outcome = match self.run_phases(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                hamster_error!("Workflow stopped: {err}");
                WorkflowOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        self.emit(WorkflowEvent::Finished(outcome.clone()));
        outcome
    }

    async fn run_phases(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, BridgeError> {
        let delay = request.delay_seconds;

        self.emit(WorkflowEvent::Phase(WorkflowPhase::Scanning));
        self.status(status::SCANNING);
        let mut files = self.bridge.find_files(&request.filter).await?;
        if request.skip_unchanged {
            files = self.drop_unchanged(files).await;
        }
        if files.is_empty() {
            self.status(status::NO_FILES);
            return Ok(WorkflowOutcome::NoFiles);
        }
        let count = files.len();
        self.status(status::found(count));
        sleep(SETTLE_DELAY).await;

        self.emit(WorkflowEvent::Phase(WorkflowPhase::Personalizing));
        self.status(status::initializing(count));
        self.bridge
            .dispatch(Request::InitializePersonalization {
                files: files.clone(),
                delay_seconds: delay,
            })
            .await?;
        self.wait_for_personalization(request, &files).await?;

        self.emit(WorkflowEvent::Phase(WorkflowPhase::Ready));
        self.status(status::SETTING_READY);
        self.bridge
            .dispatch(Request::SetFilesToReady {
                files: files.clone(),
                delay_seconds: delay,
            })
            .await?;
        sleep(SETTLE_DELAY).await;

        self.emit(WorkflowEvent::Phase(WorkflowPhase::Downloading));
        self.status(status::TRIGGERING);
        self.bridge
            .dispatch(Request::DownloadAllFiles {
                files: files.clone(),
                delay_seconds: delay,
            })
            .await?;
        self.status(status::completed(count));

        // Every file of the batch is recorded, clicked or not.
        if let Err(err) = self.history.record_batch(&files, Utc::now()).await {
            hamster_error!("Failed to save download history: {err}");
        }
        self.emit(WorkflowEvent::Phase(WorkflowPhase::Complete));
        Ok(WorkflowOutcome::Completed { files: count })
    }

    async fn wait_for_personalization(
        &self,
        request: &WorkflowRequest,
        files: &[FileEntry],
    ) -> Result<(), BridgeError> {
        let budget = request.ready_wait.budget(files.len(), request.delay_seconds);
        self.status(status::waiting(budget.as_secs()));
        match request.ready_wait {
            ReadyWait::PerFile | ReadyWait::Fixed { .. } => {
                sleep(budget).await;
                Ok(())
            }
            ReadyWait::Poll { interval_ms, .. } => {
                let interval = Duration::from_millis(interval_ms);
                self.poll_until_started(request, files, interval, budget)
                    .await
            }
        }
    }

    /// Re-scans until every file the personalize phase clicks has left the
    /// idle state, or the budget runs out.
    async fn poll_until_started(
        &self,
        request: &WorkflowRequest,
        files: &[FileEntry],
        interval: Duration,
        budget: Duration,
    ) -> Result<(), BridgeError> {
        let deadline = deadline_after(Instant::now(), budget);
        let watched: HashSet<&str> = files
            .iter()
            .filter(|file| file.status == RowState::Idle && is_personalizer_link(&file.href))
            .map(|file| file.id.as_str())
            .collect();
        if watched.is_empty() {
            hamster_info!("No file of the batch needs personalization");
            return Ok(());
        }
        loop {
            sleep(interval).await;
            let current = self.bridge.find_files(&request.filter).await?;
            let idle = current
                .iter()
                .filter(|file| watched.contains(file.id.as_str()) && file.status == RowState::Idle)
                .count();
            if idle == 0 {
                hamster_info!("All {} files left the idle state", watched.len());
                return Ok(());
            }
            if Instant::now() >= deadline {
                hamster_warn!("{idle} files still idle after {budget:?}; continuing");
                return Ok(());
            }
            hamster_debug!("{idle} files still idle");
        }
    }

    async fn drop_unchanged(&self, files: Vec<FileEntry>) -> Vec<FileEntry> {
        let history = match self.history.load().await {
            Ok(history) => history,
            Err(err) => {
                hamster_warn!("Could not load download history: {err}");
                return files;
            }
        };
        let before = files.len();
        let files: Vec<FileEntry> = files
            .into_iter()
            .filter(|file| needs_download(file, &history))
            .collect();
        hamster_info!("Skipping {} unchanged files", before - files.len());
        files
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(WorkflowEvent::Status(message.into()));
    }

    fn emit(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }
}
