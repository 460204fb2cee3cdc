use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use hamster_core::{
    FileEntry, Notification, ReadyWait, Request, Response, RowState, WorkflowOutcome,
    WorkflowPhase, WorkflowRequest,
};
use hamster_engine::{
    AssetsPage, ContentService, HistoryStore, KeyValueStore, MemoryStore, PageRow, WorkflowDriver,
    WorkflowEvent,
};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(hamster_logging::initialize_for_tests);
}

/// Page double that reacts to clicks the way the vendor does: idle rows
/// start personalizing, personalizing rows become ready.
struct VendorPage {
    rows: Vec<PageRow>,
    clicks: Vec<(String, Instant)>,
    /// Rows whose clicks the vendor ignores.
    stalled: Vec<String>,
}

impl VendorPage {
    fn new(rows: Vec<PageRow>) -> Self {
        Self {
            rows,
            clicks: Vec::new(),
            stalled: Vec::new(),
        }
    }

    fn clicks_on(&self, id: &str) -> usize {
        self.clicks.iter().filter(|(clicked, _)| clicked == id).count()
    }
}

impl AssetsPage for VendorPage {
    fn rows(&self) -> &[PageRow] {
        &self.rows
    }

    fn set_hidden(&mut self, id: &str, hidden: bool) {
        if let Some(row) = self.rows.iter_mut().find(|row| row.id == id) {
            row.hidden = hidden;
        }
    }

    fn click(&mut self, id: &str) -> bool {
        let stalled = self.stalled.iter().any(|stalled| stalled == id);
        let Some(row) = self.rows.iter_mut().find(|row| row.id == id) else {
            return false;
        };
        if row.anchor.is_none() {
            return false;
        }
        if stalled {
            self.clicks.push((id.to_string(), Instant::now()));
            return true;
        }
        row.text = match RowState::from_row_text(&row.text) {
            RowState::Idle => format!("{} Personalizing...", row.title_cell_text),
            RowState::Personalizing => format!("{} Ready!", row.title_cell_text),
            RowState::Ready => format!("{} Downloaded", row.title_cell_text),
        };
        self.clicks.push((id.to_string(), Instant::now()));
        true
    }
}

fn personalizer_row(id: &str, title: &str) -> PageRow {
    PageRow::new(id, title, format!("/store/Personalizer?id={id}"))
}

fn entry(id: &str, title: &str) -> FileEntry {
    FileEntry::new(id, title)
}

#[tokio::test(start_paused = true)]
async fn personalize_clicks_are_spaced_by_delay_in_scan_order() {
    init_logging();
    let page = Arc::new(Mutex::new(VendorPage::new(vec![
        personalizer_row("row-1", "Bestiary Box Set"),
        personalizer_row("row-2", "Core Rulebook"),
    ])));
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let mut service = ContentService::new(page.clone(), notify_tx);

    let start = Instant::now();
    let response = service
        .handle(Request::InitializePersonalization {
            files: vec![entry("row-1", "Bestiary Box Set"), entry("row-2", "Core Rulebook")],
            delay_seconds: 1,
        })
        .await;
    assert_eq!(
        response,
        Response::Status {
            status: hamster_core::ActionStatus::PersonalizationStarted
        }
    );

    tokio::time::sleep(Duration::from_secs(3)).await;

    let page = page.lock().await;
    let timeline = page
        .clicks
        .iter()
        .map(|(id, at)| (id.as_str(), at.duration_since(start)))
        .collect::<Vec<_>>();
    assert_eq!(
        timeline,
        vec![
            ("row-1", Duration::from_millis(1000)),
            ("row-2", Duration::from_millis(2000)),
        ]
    );

    let mut messages = Vec::new();
    while let Ok(Notification::UpdateStatus { message }) = notify_rx.try_recv() {
        messages.push(message);
    }
    assert_eq!(
        messages,
        vec![
            "Personalizing Bestiary Box Set... (1/2)".to_string(),
            "Personalizing Core Rulebook... (2/2)".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn personalize_skips_rows_in_flight_and_non_personalizer_links() {
    init_logging();
    let mut busy = personalizer_row("row-2", "Core Rulebook");
    busy.text = "Core Rulebook Click link again in 30 seconds".to_string();
    let page = Arc::new(Mutex::new(VendorPage::new(vec![
        personalizer_row("row-1", "Bestiary"),
        busy,
        PageRow::new("row-3", "Flip-Mat", "/store/direct-download"),
    ])));
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let mut service = ContentService::new(page.clone(), notify_tx);

    service
        .handle(Request::InitializePersonalization {
            files: vec![
                entry("row-1", "Bestiary"),
                entry("row-2", "Core Rulebook"),
                entry("row-3", "Flip-Mat"),
            ],
            delay_seconds: 1,
        })
        .await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let page = page.lock().await;
    assert_eq!(page.clicks_on("row-1"), 1);
    assert_eq!(page.clicks_on("row-2"), 0);
    assert_eq!(page.clicks_on("row-3"), 0);
    assert!(matches!(
        notify_rx.try_recv(),
        Ok(Notification::UpdateStatus { message }) if message == "Personalizing Bestiary... (1/3)"
    ));
    assert!(notify_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn ready_and_download_phases_gate_on_row_text() {
    init_logging();
    let mut personalizing = personalizer_row("row-1", "Bestiary");
    personalizing.text = "Bestiary Personalizing...".to_string();
    let idle = personalizer_row("row-2", "Core Rulebook");
    let mut ready = personalizer_row("row-3", "Pawn Box");
    ready.text = "Pawn Box Click again to download".to_string();
    let page = Arc::new(Mutex::new(VendorPage::new(vec![personalizing, idle, ready])));
    let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
    let mut service = ContentService::new(page.clone(), notify_tx);
    let files = vec![
        entry("row-1", "Bestiary"),
        entry("row-2", "Core Rulebook"),
        entry("row-3", "Pawn Box"),
    ];

    service
        .handle(Request::SetFilesToReady {
            files: files.clone(),
            delay_seconds: 1,
        })
        .await;
    tokio::time::sleep(Duration::from_secs(4)).await;
    {
        let page = page.lock().await;
        assert_eq!(page.clicks_on("row-1"), 1);
        assert_eq!(page.clicks_on("row-2"), 0);
        assert_eq!(page.clicks_on("row-3"), 0);
    }

    service
        .handle(Request::DownloadAllFiles {
            files,
            delay_seconds: 1,
        })
        .await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    let page = page.lock().await;
    assert_eq!(page.clicks_on("row-1"), 2);
    assert_eq!(page.clicks_on("row-2"), 0);
    assert_eq!(page.clicks_on("row-3"), 1);
}

#[tokio::test(start_paused = true)]
async fn json_requests_are_validated_at_the_boundary() {
    init_logging();
    let page = Arc::new(Mutex::new(VendorPage::new(vec![personalizer_row(
        "row-1",
        "Bestiary Box Set",
    )])));
    let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
    let mut service = ContentService::new(page, notify_tx);

    let reply = service
        .handle_json(r#"{"action":"filterFiles","filter":"box set"}"#)
        .await
        .unwrap();
    assert_eq!(reply, r#"{"visibleCount":1}"#);
    assert!(service.handle_json(r#"{"action":"explode"}"#).await.is_err());
}

struct Harness {
    page: Arc<Mutex<VendorPage>>,
    store: Arc<MemoryStore>,
    driver: WorkflowDriver,
    events: mpsc::UnboundedReceiver<WorkflowEvent>,
    content: tokio::task::JoinHandle<()>,
}

fn harness(rows: Vec<PageRow>) -> Harness {
    init_logging();
    let page = Arc::new(Mutex::new(VendorPage::new(rows)));
    let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
    let (bridge, content) =
        ContentService::new(page.clone(), notify_tx).spawn(Duration::from_secs(10));
    let store = Arc::new(MemoryStore::new());
    let history = HistoryStore::new(store.clone());
    let (events_tx, events) = mpsc::unbounded_channel();
    Harness {
        page,
        store,
        driver: WorkflowDriver::new(bridge, history, events_tx),
        events,
        content,
    }
}

fn request(filter: &str, ready_wait: ReadyWait) -> WorkflowRequest {
    WorkflowRequest {
        filter: filter.to_string(),
        delay_seconds: 1,
        ready_wait,
        skip_unchanged: false,
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn full_workflow_clicks_three_times_and_records_history() {
    let Harness {
        page,
        store,
        driver,
        mut events,
        content,
    } = harness(vec![
        personalizer_row("row-1", "Bestiary Box Set"),
        personalizer_row("row-2", "Bestiary 2 Box Set"),
        PageRow::new("row-3", "Box Set Poster", "/store/poster"),
        personalizer_row("row-4", "Core Rulebook"),
    ]);

    let outcome = driver.run(request("box set", ReadyWait::PerFile)).await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 3 });
    drop(driver);
    content.await.unwrap();

    let page = page.lock().await;
    assert_eq!(page.clicks_on("row-1"), 3);
    assert_eq!(page.clicks_on("row-2"), 3);
    assert_eq!(page.clicks_on("row-3"), 0);
    assert_eq!(page.clicks_on("row-4"), 0);
    assert!(page.rows[3].hidden);

    // Unclicked files are still recorded.
    let history = HistoryStore::new(store).load().await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.get("row-3").is_some());
    assert!(history.get("row-4").is_none());

    let events = drain(&mut events);
    let phases = events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Phase(phase) => Some(*phase),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        phases,
        vec![
            WorkflowPhase::Scanning,
            WorkflowPhase::Personalizing,
            WorkflowPhase::Ready,
            WorkflowPhase::Downloading,
            WorkflowPhase::Complete,
        ]
    );
    let statuses = events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Status(message) => Some(message.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            "Scanning for files to download...",
            "Found 3 files to download.",
            "Initializing personalization for 3 files...",
            "Waiting 3 seconds for personalization to complete...",
            "Setting files to ready state...",
            "Triggering downloads for all files...",
            "Download process completed for 3 files!",
        ]
    );
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Finished(WorkflowOutcome::Completed { files: 3 }))
    );
}

#[tokio::test(start_paused = true)]
async fn empty_scan_ends_the_workflow() {
    let Harness {
        store,
        driver,
        mut events,
        ..
    } = harness(vec![personalizer_row("row-1", "Core Rulebook")]);

    let outcome = driver.run(request("bestiary", ReadyWait::PerFile)).await;
    assert_eq!(outcome, WorkflowOutcome::NoFiles);
    assert!(drain(&mut events).contains(&WorkflowEvent::Status(
        "No files found to download.".to_string()
    )));
    assert!(HistoryStore::new(store).load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn polling_wait_moves_on_once_rows_leave_idle() {
    let Harness {
        page,
        driver,
        content,
        ..
    } = harness(vec![
        personalizer_row("row-1", "Bestiary Box Set"),
        personalizer_row("row-2", "Pawn Box Set"),
    ]);

    let started = Instant::now();
    let outcome = driver
        .run(request(
            "box set",
            ReadyWait::Poll {
                interval_ms: 500,
                timeout_seconds: u64::MAX,
            },
        ))
        .await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 2 });
    assert!(started.elapsed() < Duration::from_secs(10));
    drop(driver);
    content.await.unwrap();

    let page = page.lock().await;
    assert_eq!(page.clicks_on("row-1"), 3);
    assert_eq!(page.clicks_on("row-2"), 3);
}

#[tokio::test(start_paused = true)]
async fn polling_wait_ignores_rows_that_are_never_personalized() {
    let Harness { driver, .. } = harness(vec![
        personalizer_row("row-1", "Bestiary Box Set"),
        PageRow::new("row-2", "Box Set Poster", "/store/poster"),
    ]);

    let started = Instant::now();
    let outcome = driver
        .run(request(
            "box set",
            ReadyWait::Poll {
                interval_ms: 500,
                timeout_seconds: 600,
            },
        ))
        .await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 2 });
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn polling_wait_gives_up_at_timeout() {
    let Harness { page, driver, .. } = harness(vec![personalizer_row("row-1", "Bestiary Box Set")]);
    page.lock().await.stalled.push("row-1".to_string());

    let started = Instant::now();
    let outcome = driver
        .run(request(
            "box set",
            ReadyWait::Poll {
                interval_ms: 1000,
                timeout_seconds: 20,
            },
        ))
        .await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 1 });
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(page.lock().await.clicks_on("row-1"), 1);
}

#[tokio::test(start_paused = true)]
async fn skip_unchanged_drops_files_downloaded_since_their_update() {
    let mut updated = personalizer_row("row-2", "Pawn Box Set");
    updated.date_updated_text = "June 1, 2024".to_string();
    let mut unchanged = personalizer_row("row-1", "Bestiary Box Set");
    unchanged.date_updated_text = "Jan 1, 2024".to_string();
    let Harness {
        page,
        store,
        driver,
        content,
        ..
    } = harness(vec![unchanged, updated]);

    let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    HistoryStore::new(store.clone())
        .record_batch(
            &[entry("row-1", "Bestiary Box Set"), entry("row-2", "Pawn Box Set")],
            earlier,
        )
        .await
        .unwrap();

    let outcome = driver
        .run(WorkflowRequest {
            skip_unchanged: true,
            ..request("box set", ReadyWait::PerFile)
        })
        .await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 1 });
    drop(driver);
    content.await.unwrap();

    let page = page.lock().await;
    assert_eq!(page.clicks_on("row-1"), 0);
    assert_eq!(page.clicks_on("row-2"), 3);
    let history = HistoryStore::new(store).load().await.unwrap();
    assert_eq!(history.get("row-1").unwrap().last_downloaded, earlier);
    assert!(history.get("row-2").unwrap().last_downloaded > earlier);
}

#[tokio::test(start_paused = true)]
async fn closed_page_surface_fails_the_run() {
    let Harness {
        driver,
        content,
        mut events,
        ..
    } = harness(vec![personalizer_row("row-1", "Bestiary Box Set")]);
    content.abort();
    let _ = content.await;

    let outcome = driver.run(request("box set", ReadyWait::PerFile)).await;
    assert!(matches!(outcome, WorkflowOutcome::Failed { .. }));
    assert!(matches!(
        drain(&mut events).last(),
        Some(WorkflowEvent::Finished(WorkflowOutcome::Failed { .. }))
    ));
}

#[tokio::test]
async fn history_write_failures_do_not_fail_the_run() {
    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(
            &self,
            _key: &str,
        ) -> Result<Option<serde_json::Value>, hamster_engine::StoreError> {
            Ok(None)
        }
        async fn set(
            &self,
            _key: &str,
            _value: serde_json::Value,
        ) -> Result<(), hamster_engine::StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
        async fn remove(&self, _key: &str) -> Result<(), hamster_engine::StoreError> {
            Ok(())
        }
    }

    init_logging();
    tokio::time::pause();
    let page = Arc::new(Mutex::new(VendorPage::new(vec![personalizer_row(
        "row-1",
        "Bestiary Box Set",
    )])));
    let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
    let (bridge, _content) = ContentService::new(page, notify_tx).spawn(Duration::from_secs(10));
    let (events_tx, _events) = mpsc::unbounded_channel();
    let history = HistoryStore::new(Arc::new(ReadOnlyStore));
    let driver = WorkflowDriver::new(bridge, history, events_tx);

    let outcome = driver.run(request("box set", ReadyWait::Fixed { seconds: 2 })).await;
    assert_eq!(outcome, WorkflowOutcome::Completed { files: 1 });
}
