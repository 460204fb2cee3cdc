//! Page surface: answers bridge requests against the page and schedules the
//! timed clicks of each workflow phase.
use std::sync::Arc;
use std::time::Duration;

use hamster_core::{
    click_offset, is_personalizer_link, workflow::status, ActionStatus, FileEntry, Notification,
    ProtocolError, Request, Response, RowState,
};
use hamster_logging::{hamster_debug, hamster_error, hamster_info};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::bridge::Bridge;
use crate::driver::deadline_after;
use crate::page::AssetsPage;
use crate::scanner::{filter_rows, row_state, scan};

const REQUEST_QUEUE: usize = 32;

/// A request travelling to the page surface with its reply channel.
pub(crate) struct Envelope {
    pub(crate) request: Request,
    pub(crate) reply: oneshot::Sender<Response>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickPhase {
    Personalize,
    Ready,
    Download,
}

pub struct ContentService<P> {
    page: Arc<Mutex<P>>,
    notifications: mpsc::UnboundedSender<Notification>,
    pending: Vec<JoinHandle<()>>,
}

impl<P: AssetsPage + 'static> ContentService<P> {
    pub fn new(page: Arc<Mutex<P>>, notifications: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            page,
            notifications,
            pending: Vec::new(),
        }
    }

    /// Runs the service on its own task. The task ends once every [`Bridge`]
    /// clone is dropped and all scheduled clicks have fired.
    pub fn spawn(self, request_timeout: Duration) -> (Bridge, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let task = tokio::spawn(self.run(rx));
        (Bridge::new(tx, request_timeout), task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            let action = envelope.request.action();
            let response = self.handle(envelope.request).await;
            if envelope.reply.send(response).is_err() {
                hamster_debug!("Requester of {action} went away before the reply");
            }
        }
        for task in self.pending.drain(..) {
            if let Err(err) = task.await {
                hamster_error!("Scheduled clicks were lost: {err}");
            }
        }
        hamster_debug!("Content service stopped");
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        self.pending.retain(|task| !task.is_finished());
        match request {
            Request::FindDownloadableFiles { filter } => {
                let mut page = self.page.lock().await;
                Response::Files {
                    files: scan(&mut *page, &filter),
                }
            }
            Request::FilterFiles { filter } => {
                let mut page = self.page.lock().await;
                Response::VisibleCount {
                    visible_count: filter_rows(&mut *page, &filter),
                }
            }
            Request::InitializePersonalization {
                files,
                delay_seconds,
            } => {
                self.schedule(ClickPhase::Personalize, files, delay_seconds)
                    .await;
                Response::Status {
                    status: ActionStatus::PersonalizationStarted,
                }
            }
            Request::SetFilesToReady {
                files,
                delay_seconds,
            } => {
                self.schedule(ClickPhase::Ready, files, delay_seconds).await;
                Response::Status {
                    status: ActionStatus::SetToReady,
                }
            }
            Request::DownloadAllFiles {
                files,
                delay_seconds,
            } => {
                self.schedule(ClickPhase::Download, files, delay_seconds)
                    .await;
                Response::Status {
                    status: ActionStatus::DownloadsTriggered,
                }
            }
        }
    }

    /// Wire entry point: validates a JSON request and answers in JSON.
    pub async fn handle_json(&mut self, raw: &str) -> Result<String, ProtocolError> {
        let request = Request::from_json(raw)?;
        let response = self.handle(request).await;
        Ok(serde_json::to_string(&response)?)
    }

    /// Schedules one click per file at `delay × position` after now. The
    /// position counts over the whole batch, so skipped files keep their slot.
    async fn schedule(&mut self, phase: ClickPhase, files: Vec<FileEntry>, delay_seconds: u64) {
        let total = files.len();
        let files = if phase == ClickPhase::Personalize {
            self.personalizable(files).await
        } else {
            files.into_iter().enumerate().map(|(i, f)| (i + 1, f)).collect()
        };
        hamster_info!(
            "Scheduling {:?} clicks for {} of {} files",
            phase,
            files.len(),
            total
        );

        let start = Instant::now();
        let page = self.page.clone();
        let notifications = self.notifications.clone();
        let task = tokio::spawn(async move {
            for (position, file) in files {
                sleep_until(deadline_after(start, click_offset(delay_seconds, position))).await;
                let mut page = page.lock().await;
                if fire(&mut *page, phase, &file) && phase == ClickPhase::Personalize {
                    let message = status::personalizing(&file.title, position, total);
                    let _ = notifications.send(Notification::UpdateStatus { message });
                }
            }
        });
        self.pending.push(task);
    }

    /// Files still needing the first click, paired with their batch position.
    async fn personalizable(&self, files: Vec<FileEntry>) -> Vec<(usize, FileEntry)> {
        let page = self.page.lock().await;
        files
            .into_iter()
            .enumerate()
            .filter_map(|(index, file)| {
                let row = page.row(&file.id)?;
                let href = row.anchor.as_ref().map(|anchor| anchor.href.as_str())?;
                let state = RowState::from_row_text(&row.text);
                if state == RowState::Idle && is_personalizer_link(href) {
                    Some((index + 1, file))
                } else {
                    hamster_debug!("Not personalizing {} ({:?})", file.title, state);
                    None
                }
            })
            .collect()
    }
}

/// Clicks the row if its current state allows it for this phase.
fn fire(page: &mut dyn AssetsPage, phase: ClickPhase, file: &FileEntry) -> bool {
    let Some(state) = row_state(page, &file.id) else {
        hamster_debug!("Row {} vanished; skipping {:?} click", file.id, phase);
        return false;
    };
    let allowed = match phase {
        ClickPhase::Personalize => state == RowState::Idle,
        ClickPhase::Ready => state == RowState::Personalizing,
        ClickPhase::Download => state == RowState::Ready,
    };
    if !allowed {
        hamster_debug!("Skipping {:?} click on {} ({:?})", phase, file.title, state);
        return false;
    }
    let clicked = page.click(&file.id);
    if clicked {
        hamster_info!("{:?} click on {}", phase, file.title);
    } else {
        hamster_debug!("No anchor for {}; skipping", file.title);
    }
    clicked
}
