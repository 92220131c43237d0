//! Batch downloader facade
//!
//! Wires configuration, output layout, manifest, record store, fetcher,
//! report log and coordinator together. One instance covers one manifest
//! load; create a new instance to pick up artifacts written by an earlier run.

use crate::cleanup::{self, CleanupReport};
use crate::config::Config;
use crate::coordinator::{DownloadCoordinator, EVENT_CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::layout::OutputLayout;
use crate::manifest::{exclude_existing, load_manifest};
use crate::report::ReportLog;
use crate::store::RecordStore;
use crate::summary::{self, Summary};
use crate::types::{Event, RunStats};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Main entry point: downloads a manifest's documents with fallback
pub struct BatchDownloader {
    config: Arc<Config>,
    layout: Arc<OutputLayout>,
    store: Arc<RecordStore>,
    report: Arc<ReportLog>,
    event_tx: broadcast::Sender<Event>,
    coordinator: DownloadCoordinator,
}

impl BatchDownloader {
    /// Create a downloader that fetches over HTTP
    ///
    /// Validates `config`, creates the output directories, loads the manifest
    /// and drops records whose artifact already exists.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use fallback_dl::{BatchDownloader, Config};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config {
    ///     manifest_path: "reports.csv".into(),
    ///     ..Default::default()
    /// };
    /// let downloader = BatchDownloader::new(config).await?;
    /// let stats = downloader.run().await?;
    /// println!("{} downloaded", stats.downloaded);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(&config.download)?);
        Self::assemble(config, fetcher).await
    }

    /// Create a downloader with a custom [`Fetcher`]
    pub async fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, fetcher).await
    }

    async fn assemble(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let layout = Arc::new(OutputLayout::new(
            &config.output_dir,
            config.download.artifact_extension.as_str(),
            config.report.file_name.as_str(),
        ));
        layout.prepare().await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create output directory '{}': {}",
                    layout.artifact_dir().display(),
                    e
                ),
            ))
        })?;

        // Blocking CSV read, kept off the async workers
        let manifest_path = config.manifest_path.clone();
        let columns = config.columns.clone();
        let delimiter = config.manifest_delimiter;
        let rows = tokio::task::spawn_blocking(move || {
            load_manifest(&manifest_path, &columns, delimiter)
        })
        .await
        .unwrap_or_else(|e| Err(Error::Other(format!("manifest loader task failed: {e}"))))?;
        let existing = layout.existing_artifact_ids().await?;
        let store = Arc::new(RecordStore::from_rows(exclude_existing(rows, &existing)));

        let report = Arc::new(ReportLog::new(
            layout.report_path(),
            config.report.delimiter,
        )?);

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let coordinator = DownloadCoordinator::new(
            Arc::clone(&store),
            fetcher,
            Arc::clone(&report),
            Arc::clone(&layout),
        )
        .with_event_sender(event_tx.clone());

        tracing::info!(
            records = store.len(),
            output_dir = ?layout.root(),
            "batch downloader ready"
        );

        Ok(Self {
            config: Arc::new(config),
            layout,
            store,
            report,
            event_tx,
            coordinator,
        })
    }

    /// Reset the report, then download the first `download.limit` records
    /// with `download.workers` concurrent workers
    pub async fn run(&self) -> Result<RunStats> {
        self.report.reset().await?;
        let ids = self.store.ids(self.config.download.limit);
        Ok(self.coordinator.run(ids, self.config.download.workers).await)
    }

    /// Summarize the first `download.limit` records
    pub async fn summarize(&self) -> Result<Summary> {
        summary::summarize(&self.store, &self.layout, self.config.download.limit).await
    }

    /// Delete every downloaded artifact
    ///
    /// Must not be called while [`run`](Self::run) is in progress.
    pub async fn delete_downloaded_files(&self) -> Result<CleanupReport> {
        cleanup::delete_all_artifacts(&self.layout).await
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported; events sent while nobody listens
    /// are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Loaded records
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Outcome report
    pub fn report(&self) -> &ReportLog {
        &self.report
    }

    /// Output paths
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
