use std::fs;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use hamster_core::{needs_download, workflow::status, WorkflowOutcome, MIN_FILTER_LEN};
use hamster_engine::{
    scan, AssetsPage, ContentService, Downloader, HistoryStore, HtmlAssetsPage, JsonFileStore,
    KeyValueStore, Preferences,
};
use hamster_logging::{hamster_info, hamster_warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::popup::{Popup, RunSettings};

pub async fn execute(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.store_path));
    match command {
        Commands::Scan { page, filter } => scan_page(&page, &filter, store).await,
        Commands::Filter { page, filter } => filter_page(&page, &filter, config, store).await,
        Commands::Run { page, filter, .. } => run_workflow(&page, &filter, config, store).await,
        Commands::History => show_history(store).await,
        Commands::Prefs {
            setting1,
            setting2,
            clear,
        } => preferences(setting1, setting2, clear, store).await,
        Commands::Fetch { url, path } => fetch(&url, &path, config).await,
    }
}

fn load_page(path: &Path) -> anyhow::Result<HtmlAssetsPage> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read page {}", path.display()))?;
    let page = HtmlAssetsPage::from_bytes(&bytes, None)
        .with_context(|| format!("failed to parse page {}", path.display()))?;
    hamster_info!("Loaded {} rows from {}", page.rows().len(), path.display());
    Ok(page)
}

async fn scan_page(path: &Path, filter: &str, store: Arc<dyn KeyValueStore>) -> anyhow::Result<()> {
    let mut page = load_page(path)?;
    let files = scan(&mut page, filter);
    if files.is_empty() {
        println!("{}", status::NO_FILES);
        return Ok(());
    }

    let history = HistoryStore::new(store).load().await?;
    for file in &files {
        let mark = if needs_download(file, &history) {
            "new"
        } else {
            "ok"
        };
        println!(
            "{mark:<4}{:<14}{:<22}{:<22}{}",
            format!("{:?}", file.status),
            file.last_downloaded,
            file.date_updated,
            file.title
        );
    }
    println!("{}", status::found(files.len()));
    Ok(())
}

/// A page served by the content service with a popup attached to it.
struct Session {
    page: Arc<Mutex<HtmlAssetsPage>>,
    popup: Popup<Stdout>,
    content: JoinHandle<()>,
}

impl Session {
    async fn open(
        path: &Path,
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<Self> {
        let page = Arc::new(Mutex::new(load_page(path)?));
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (bridge, content) =
            ContentService::new(page.clone(), notify_tx).spawn(config.request_timeout());
        let settings = RunSettings {
            ready_wait: config.ready_wait,
            skip_unchanged: config.skip_unchanged,
        };
        let mut popup = Popup::new(store, bridge, settings, io::stdout());
        popup.forward_notifications(notify_rx);
        popup.open().await;
        Ok(Self {
            page,
            popup,
            content,
        })
    }

    /// Closes the popup and waits for every scheduled click. Returns the
    /// ids clicked on the page, in order.
    async fn close(self) -> anyhow::Result<Vec<String>> {
        drop(self.popup);
        self.content.await.context("content service panicked")?;
        let page = self.page.lock().await;
        Ok(page.clicks().to_vec())
    }
}

async fn filter_page(
    path: &Path,
    filter: &str,
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
) -> anyhow::Result<()> {
    let mut session = Session::open(path, config, store).await?;
    session.popup.input_filter(filter).await;
    if session.popup.view().filter_active {
        match session.popup.wait_for_filter().await {
            Some(count) => hamster_info!("{count} rows visible for {filter:?}"),
            None => hamster_warn!("Filter {filter:?} was not applied to the page"),
        }
    }
    session.close().await?;
    Ok(())
}

async fn run_workflow(
    path: &Path,
    filter: &str,
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
) -> anyhow::Result<()> {
    let mut session = Session::open(path, config, store).await?;
    session.popup.input_filter(filter).await;
    if !session.popup.click_download(config.delay_seconds).await {
        bail!("download needs a filter of at least {MIN_FILTER_LEN} characters");
    }
    let outcome = session.popup.wait_for_workflow().await;
    let clicks = session.close().await?;
    println!("{} clicks sent to the page", clicks.len());

    match outcome {
        Some(WorkflowOutcome::Failed { reason }) => bail!(reason),
        Some(_) => Ok(()),
        None => bail!("workflow ended without reporting an outcome"),
    }
}

async fn show_history(store: Arc<dyn KeyValueStore>) -> anyhow::Result<()> {
    let history = HistoryStore::new(store).load().await?;
    if history.is_empty() {
        println!("No downloads recorded yet.");
        return Ok(());
    }
    for (id, record) in history.iter() {
        println!(
            "{}  {:<12}{}",
            record.last_downloaded.format("%Y-%m-%d %H:%M:%S UTC"),
            id,
            record.title
        );
    }
    Ok(())
}

async fn preferences(
    setting1: Option<String>,
    setting2: Option<String>,
    clear: bool,
    store: Arc<dyn KeyValueStore>,
) -> anyhow::Result<()> {
    if clear {
        Preferences::clear(&*store).await?;
        println!("Preferences cleared.");
        return Ok(());
    }

    let mut prefs = Preferences::load(&*store).await?.unwrap_or_default();
    if setting1.is_some() || setting2.is_some() {
        if let Some(value) = setting1 {
            prefs.setting1 = value;
        }
        if let Some(value) = setting2 {
            prefs.setting2 = value;
        }
        prefs.save(&*store).await?;
        println!("Preferences saved.");
    }
    println!("setting1: {}", prefs.setting1);
    println!("setting2: {}", prefs.setting2);
    Ok(())
}

async fn fetch(url: &str, path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let downloader = Downloader::new(config.download_timeout())?;
    match downloader.download_file(url, path).await {
        Ok(bytes) => {
            println!("Saved {bytes} bytes to {}", path.display());
            Ok(())
        }
        Err(err) => {
            hamster_warn!("Download of {url} failed: {err}");
            Err(err.into())
        }
    }
}
