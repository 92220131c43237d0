//! Download coordinator — fans records out to a bounded worker pool.
//!
//! Per record, exactly one worker:
//! 1. fetches the primary location into the artifact path
//! 2. on failure stores the diagnostic and fetches the secondary location
//! 3. on a second failure overwrites the diagnostic with the secondary one
//! 4. appends `Downloaded` / `Not downloaded` to the report
//!
//! Failures are per record. A record with a missing location, or whose fetch
//! phase panics, gets an `Unexpected error: ` diagnostic and a
//! `Not downloaded` row; the remaining workers carry on.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::{JoinError, JoinSet};

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::layout::OutputLayout;
use crate::report::ReportLog;
use crate::store::{Record, RecordStore};
use crate::types::{Event, Outcome, RecordId, RunStats, UsedLocation};

/// Prefix of diagnostics for failures outside the fetch protocol
pub const UNEXPECTED_ERROR_PREFIX: &str = "Unexpected error: ";

/// Capacity of the event broadcast channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Which of the two attempts a log line or event refers to
#[derive(Clone, Copy, Debug)]
enum Attempt {
    Primary,
    Secondary,
}

impl Attempt {
    fn as_str(self) -> &'static str {
        match self {
            Attempt::Primary => "primary",
            Attempt::Secondary => "secondary",
        }
    }
}

/// Result of one worker's pass over a record
struct RecordRun {
    outcome: Outcome,
    panicked: bool,
}

/// Runs the fetch-with-fallback protocol over a batch of record ids
///
/// Cloneable; all fields are shared handles, so each worker task holds its own
/// clone.
#[derive(Clone)]
pub struct DownloadCoordinator {
    store: Arc<RecordStore>,
    fetcher: Arc<dyn Fetcher>,
    report: Arc<ReportLog>,
    layout: Arc<OutputLayout>,
    event_tx: broadcast::Sender<Event>,
}

impl DownloadCoordinator {
    /// Create a coordinator with its own event channel
    pub fn new(
        store: Arc<RecordStore>,
        fetcher: Arc<dyn Fetcher>,
        report: Arc<ReportLog>,
        layout: Arc<OutputLayout>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            fetcher,
            report,
            layout,
            event_tx,
        }
    }

    /// Publish events on an existing channel instead
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = event_tx;
        self
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Process `record_ids` with at most `worker_count` records in flight
    ///
    /// Every id gets its own task; the call returns once all of them have
    /// joined. A `worker_count` of 0 is treated as 1. The report is not reset
    /// here; callers that want a fresh report reset it before the run.
    pub async fn run(&self, record_ids: Vec<RecordId>, worker_count: usize) -> RunStats {
        let workers = worker_count.max(1);
        let total = record_ids.len();
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(records = total, workers, "starting download run");
        self.event_tx
            .send(Event::RunStarted { total, workers })
            .ok();

        let pool = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for id in record_ids {
            let worker = self.clone();
            let pool = Arc::clone(&pool);
            tasks.spawn(async move {
                // Pool is never closed
                let _permit = pool.acquire_owned().await.ok();
                worker.process(id).await
            });
        }

        let mut stats = RunStats {
            dispatched: total,
            downloaded: 0,
            not_downloaded: 0,
            panicked: 0,
            started_at,
            finished_at: started_at,
            elapsed: Default::default(),
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(run) => {
                    match run.outcome {
                        Outcome::Downloaded => stats.downloaded += 1,
                        Outcome::NotDownloaded => stats.not_downloaded += 1,
                    }
                    if run.panicked {
                        stats.panicked += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "download worker task failed");
                    stats.not_downloaded += 1;
                    if e.is_panic() {
                        stats.panicked += 1;
                    }
                }
            }
        }

        stats.finished_at = Utc::now();
        stats.elapsed = start.elapsed();
        tracing::info!(
            records = total,
            workers,
            downloaded = stats.downloaded,
            not_downloaded = stats.not_downloaded,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            "download run finished"
        );
        self.event_tx
            .send(Event::RunFinished {
                stats: stats.clone(),
            })
            .ok();

        stats
    }

    /// Full per-record protocol: fetch phase, then exactly one report row
    async fn process(self, id: RecordId) -> RecordRun {
        self.event_tx
            .send(Event::RecordStarted { id: id.clone() })
            .ok();

        // Separate task: a panicking fetcher must still leave a report row
        let fetch_phase = tokio::spawn({
            let worker = self.clone();
            let id = id.clone();
            async move { worker.fetch_phase(&id).await }
        });

        let run = match fetch_phase.await {
            Ok(outcome) => RecordRun {
                outcome,
                panicked: false,
            },
            Err(e) => self.record_fetch_phase_failure(&id, e).await,
        };

        if let Err(e) = self.report.append(id.as_str(), run.outcome).await {
            tracing::warn!(record_id = %id, error = %e, "failed to write report row");
        }

        let used = match self.store.get(&id) {
            Some(record) => record.state().await.used,
            None => UsedLocation::None,
        };
        self.event_tx
            .send(Event::RecordFinished {
                id,
                outcome: run.outcome,
                used,
            })
            .ok();

        run
    }

    /// Primary attempt, then secondary attempt on failure
    async fn fetch_phase(&self, id: &RecordId) -> Outcome {
        let Some(record) = self.store.get(id) else {
            tracing::warn!(record_id = %id, "record id not in store, skipping");
            return Outcome::NotDownloaded;
        };

        if let Some(missing) = missing_location(record) {
            let msg = format!(
                "{UNEXPECTED_ERROR_PREFIX}record {id} has no {} location",
                missing.as_str()
            );
            tracing::warn!(record_id = %id, error = %msg, "cannot download record");
            record.set_error(msg).await;
            record.finish(UsedLocation::None).await;
            return Outcome::NotDownloaded;
        }

        let destination = self.layout.artifact_path(id);

        record.begin_attempt(UsedLocation::Primary).await;
        let primary_error = match self.fetcher.fetch(&record.primary, &destination).await {
            Ok(bytes) => {
                tracing::info!(record_id = %id, bytes, "downloaded from primary location");
                record.finish(UsedLocation::Primary).await;
                return Outcome::Downloaded;
            }
            Err(e) => e,
        };

        log_attempt_failure(id, Attempt::Primary, &primary_error);
        let diagnostic = primary_error.to_string();
        record.set_error(diagnostic.clone()).await;
        self.event_tx
            .send(Event::PrimaryFailed {
                id: id.clone(),
                error: diagnostic,
            })
            .ok();

        record.begin_attempt(UsedLocation::Secondary).await;
        match self.fetcher.fetch(&record.secondary, &destination).await {
            Ok(bytes) => {
                tracing::info!(record_id = %id, bytes, "downloaded from secondary location");
                record.finish(UsedLocation::Secondary).await;
                Outcome::Downloaded
            }
            Err(secondary_error) => {
                log_attempt_failure(id, Attempt::Secondary, &secondary_error);
                record.set_error(secondary_error.to_string()).await;
                record.finish(UsedLocation::None).await;
                Outcome::NotDownloaded
            }
        }
    }

    async fn record_fetch_phase_failure(&self, id: &RecordId, e: JoinError) -> RecordRun {
        let panicked = e.is_panic();
        let detail = if panicked {
            format!("worker panicked: {}", panic_message(e))
        } else {
            format!("worker cancelled: {e}")
        };
        tracing::error!(record_id = %id, error = %detail, "download worker failed");

        if let Some(record) = self.store.get(id) {
            record.set_error(format!("{UNEXPECTED_ERROR_PREFIX}{detail}")).await;
            record.finish(UsedLocation::None).await;
        }

        RecordRun {
            outcome: Outcome::NotDownloaded,
            panicked,
        }
    }
}

fn missing_location(record: &Record) -> Option<Attempt> {
    if record.primary.trim().is_empty() {
        Some(Attempt::Primary)
    } else if record.secondary.trim().is_empty() {
        Some(Attempt::Secondary)
    } else {
        None
    }
}

fn log_attempt_failure(id: &RecordId, attempt: Attempt, error: &FetchError) {
    let attempt = attempt.as_str();
    match error {
        FetchError::Status { code, .. } => {
            tracing::warn!(record_id = %id, attempt, status = code, "server refused download");
        }
        FetchError::Timeout(_) | FetchError::Connection(_) | FetchError::Protocol(_) => {
            tracing::warn!(record_id = %id, attempt, error = %error, "network failure");
        }
        FetchError::Io(_) => {
            tracing::warn!(record_id = %id, attempt, error = %error, "local I/O failure while saving");
        }
        FetchError::InvalidLocation(_) | FetchError::Unexpected(_) => {
            tracing::warn!(record_id = %id, attempt, error = %error, "download attempt failed");
        }
    }
}

fn panic_message(e: JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
