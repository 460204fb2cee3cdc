//! Popup session: feeds user input through the core state machine, renders
//! the resulting view and carries out the effects it asks for.
use std::io::Write;
use std::sync::Arc;

use hamster_core::{
    update, AppState, AppViewModel, Effect, Msg, Notification, ReadyWait, WorkflowOutcome,
    WorkflowRequest,
};
use hamster_engine::{
    ensure_initialized, load_last_filter, save_last_filter, Bridge, HistoryStore, KeyValueStore,
    WorkflowDriver, WorkflowEvent,
};
use hamster_logging::{hamster_debug, hamster_error, hamster_info, hamster_warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::render::render;

/// Workflow knobs that do not come from the popup itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub ready_wait: ReadyWait,
    pub skip_unchanged: bool,
}

pub struct Popup<W> {
    state: AppState,
    shown: AppViewModel,
    store: Arc<dyn KeyValueStore>,
    bridge: Bridge,
    settings: RunSettings,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    out: W,
}

impl<W: Write> Popup<W> {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        bridge: Bridge,
        settings: RunSettings,
        out: W,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            state: AppState::new(),
            shown: AppViewModel::default(),
            store,
            bridge,
            settings,
            msg_tx,
            msg_rx,
            out,
        }
    }

    /// Prepares storage, shows the initial view and restores the last filter.
    /// Storage failures are logged and the popup opens with an empty filter.
    pub async fn open(&mut self) {
        if let Err(err) = ensure_initialized(&*self.store).await {
            hamster_error!("Failed to initialize storage: {err}");
        }
        self.refresh_view();
        match load_last_filter(&*self.store).await {
            Ok(Some(filter)) => {
                hamster_info!("Restoring last filter {filter:?}");
                self.dispatch(Msg::RestoreLastFilter(filter)).await;
            }
            Ok(None) => {}
            Err(err) => hamster_error!("Failed to load last filter: {err}"),
        }
    }

    /// Relays status notifications from the page surface into the inbox.
    pub fn forward_notifications(&self, mut notifications: mpsc::UnboundedReceiver<Notification>) {
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            while let Some(Notification::UpdateStatus { message }) = notifications.recv().await {
                if tx.send(Msg::WorkflowStatus(message)).is_err() {
                    break;
                }
            }
        });
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    pub async fn input_filter(&mut self, text: &str) {
        self.dispatch(Msg::FilterInputChanged(text.to_string())).await;
    }

    /// Clicks Download. Returns whether a workflow run started.
    pub async fn click_download(&mut self, delay_seconds: u64) -> bool {
        self.dispatch(Msg::DownloadClicked { delay_seconds }).await;
        self.state.is_running()
    }

    /// Processes the inbox until the page has applied the current filter.
    /// Returns `None` when the page surface could not be reached.
    pub async fn wait_for_filter(&mut self) -> Option<usize> {
        let current = self.state.filter_input().to_string();
        let answered = |msg: &Msg| match msg {
            Msg::FilterApplied { filter, .. } | Msg::FilterFailed { filter, .. } => {
                *filter == current
            }
            _ => false,
        };
        match self.run_until(answered).await {
            Some(Msg::FilterApplied { visible_count, .. }) => Some(visible_count),
            _ => None,
        }
    }

    /// Processes the inbox until the running workflow reports its outcome.
    pub async fn wait_for_workflow(&mut self) -> Option<WorkflowOutcome> {
        match self
            .run_until(|msg| matches!(msg, Msg::WorkflowFinished(_)))
            .await
        {
            Some(Msg::WorkflowFinished(outcome)) => Some(outcome),
            _ => None,
        }
    }

    async fn run_until(&mut self, stop: impl Fn(&Msg) -> bool) -> Option<Msg> {
        while let Some(msg) = self.msg_rx.recv().await {
            let done = stop(&msg).then(|| msg.clone());
            self.dispatch(msg).await;
            if done.is_some() {
                return done;
            }
        }
        None
    }

    async fn dispatch(&mut self, msg: Msg) {
        hamster_debug!("Popup message {msg:?}");
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        if self.state.consume_dirty() {
            self.refresh_view();
        }
        for effect in effects {
            self.run_effect(effect).await;
        }
    }

    fn refresh_view(&mut self) {
        let view = self.state.view();
        for line in render(&self.shown, &view) {
            if let Err(err) = writeln!(self.out, "{line}") {
                hamster_warn!("Failed to write popup output: {err}");
            }
        }
        self.shown = view;
    }

    async fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::PersistLastFilter(filter) => {
                if let Err(err) = save_last_filter(&*self.store, &filter).await {
                    hamster_error!("Failed to save last filter: {err}");
                }
            }
            Effect::ScheduleDebounce { generation, delay } => {
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(Msg::DebounceElapsed { generation });
                });
            }
            Effect::SendFilter(filter) => {
                let bridge = self.bridge.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    match bridge.filter_files(&filter).await {
                        Ok(visible_count) => {
                            let _ = tx.send(Msg::FilterApplied {
                                filter,
                                visible_count,
                            });
                        }
                        Err(err) => {
                            hamster_warn!("Filter {filter:?} was not applied: {err}");
                            let _ = tx.send(Msg::FilterFailed {
                                filter,
                                reason: err.to_string(),
                            });
                        }
                    }
                });
            }
            Effect::StartWorkflow {
                filter,
                delay_seconds,
            } => self.start_workflow(filter, delay_seconds),
        }
    }

    fn start_workflow(&self, filter: String, delay_seconds: u64) {
        let request = WorkflowRequest {
            filter,
            delay_seconds,
            ready_wait: self.settings.ready_wait,
            skip_unchanged: self.settings.skip_unchanged,
        };
        hamster_info!(
            "Starting workflow for {:?} (delay {}s, wait {})",
            request.filter,
            request.delay_seconds,
            request.ready_wait
        );

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let driver = WorkflowDriver::new(
            self.bridge.clone(),
            HistoryStore::new(self.store.clone()),
            events_tx,
        );
        tokio::spawn(async move {
            driver.run(request).await;
        });

        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let msg = match event {
                    WorkflowEvent::Phase(phase) => {
                        hamster_debug!("Workflow entered {phase:?}");
                        continue;
                    }
                    WorkflowEvent::Status(message) => Msg::WorkflowStatus(message),
                    WorkflowEvent::Finished(outcome) => Msg::WorkflowFinished(outcome),
                };
                if tx.send(msg).is_err() {
                    break;
                }
            }
        });
    }
}
