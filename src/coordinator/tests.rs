//! Tests for the download coordinator.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::fetcher::FetchOutcome;
use crate::store::Record;

/// What the scripted fetcher does for one location
#[derive(Clone)]
enum Script {
    Serve(&'static [u8]),
    Fail(FetchError),
    Panic(&'static str),
}

/// Fetcher that answers from a location → script table and records calls
#[derive(Default)]
struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    delay: Duration,
    calls: std::sync::Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn with(mut self, location: &str, script: Script) -> Self {
        self.scripts.insert(location.to_string(), script);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, location: &str, destination: &Path) -> FetchOutcome {
        self.calls.lock().unwrap().push(location.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripts.get(location).cloned() {
            Some(Script::Serve(body)) => {
                tokio::fs::write(destination, body).await?;
                Ok(body.len() as u64)
            }
            Some(Script::Fail(e)) => Err(e),
            Some(Script::Panic(msg)) => panic!("{msg}"),
            None => Err(FetchError::Status {
                code: 404,
                reason: "Not Found".into(),
            }),
        }
    }
}

struct Harness {
    _temp: TempDir,
    store: Arc<RecordStore>,
    fetcher: Arc<ScriptedFetcher>,
    report: Arc<ReportLog>,
    layout: Arc<OutputLayout>,
    coordinator: DownloadCoordinator,
}

impl Harness {
    async fn new(records: Vec<Record>, fetcher: ScriptedFetcher) -> Self {
        let temp = TempDir::new().unwrap();
        let layout = Arc::new(OutputLayout::new(temp.path(), "pdf", "report.csv"));
        layout.prepare().await.unwrap();
        let store = Arc::new(RecordStore::from_records(records));
        let fetcher = Arc::new(fetcher);
        let report = Arc::new(ReportLog::new(layout.report_path(), ';').unwrap());
        report.reset().await.unwrap();
        let coordinator = DownloadCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::clone(&report),
            Arc::clone(&layout),
        );
        Self {
            _temp: temp,
            store,
            fetcher,
            report,
            layout,
            coordinator,
        }
    }

    async fn state(&self, id: &str) -> crate::store::RecordState {
        self.store.get(&RecordId::from(id)).unwrap().state().await
    }

    fn artifact(&self, id: &str) -> std::path::PathBuf {
        self.layout.artifact_path(&RecordId::from(id))
    }

    async fn report_rows(&self) -> HashMap<String, Outcome> {
        self.report
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.result))
            .collect()
    }
}

fn record(id: &str) -> Record {
    Record::new(
        RecordId::from(id),
        format!("main://{id}"),
        format!("backup://{id}"),
    )
}

fn server_error() -> FetchError {
    FetchError::Status {
        code: 500,
        reason: "Internal Server Error".into(),
    }
}

// -----------------------------------------------------------------------
// Per-record protocol
// -----------------------------------------------------------------------

#[tokio::test]
async fn primary_success_skips_secondary() {
    let h = Harness::new(
        vec![record("a")],
        ScriptedFetcher::default().with("main://a", Script::Serve(b"%PDF-a")),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(10), 2).await;

    assert_eq!(stats.downloaded, 1);
    assert_eq!(h.fetcher.calls(), vec!["main://a"]);
    assert_eq!(std::fs::read(h.artifact("a")).unwrap(), b"%PDF-a");
    let state = h.state("a").await;
    assert_eq!(state.used, UsedLocation::Primary);
    assert_eq!(state.last_error, None);
    assert!(state.processed);
    assert_eq!(h.report_rows().await["a"], Outcome::Downloaded);
}

#[tokio::test]
async fn primary_failure_falls_back_to_secondary() {
    let h = Harness::new(
        vec![record("b")],
        ScriptedFetcher::default()
            .with("main://b", Script::Fail(server_error()))
            .with("backup://b", Script::Serve(b"%PDF-b")),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(10), 2).await;

    assert_eq!(stats.downloaded, 1);
    assert_eq!(h.fetcher.calls(), vec!["main://b", "backup://b"]);
    assert!(h.artifact("b").exists());
    let state = h.state("b").await;
    assert_eq!(state.used, UsedLocation::Secondary);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to download: 500 - Internal Server Error"),
        "the superseded primary failure stays on record"
    );
    assert_eq!(h.report_rows().await["b"], Outcome::Downloaded);
}

#[tokio::test]
async fn double_failure_keeps_secondary_diagnostic() {
    let h = Harness::new(
        vec![record("c")],
        ScriptedFetcher::default()
            .with(
                "main://c",
                Script::Fail(FetchError::Timeout("operation timed out".into())),
            )
            .with(
                "backup://c",
                Script::Fail(FetchError::Status {
                    code: 404,
                    reason: "Not Found".into(),
                }),
            ),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(10), 2).await;

    assert_eq!(stats.not_downloaded, 1);
    assert!(!h.artifact("c").exists());
    let state = h.state("c").await;
    assert_eq!(state.used, UsedLocation::None);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to download: 404 - Not Found")
    );
    assert_eq!(h.report_rows().await["c"], Outcome::NotDownloaded);
}

#[tokio::test]
async fn record_without_location_is_an_unexpected_error() {
    let h = Harness::new(
        vec![Record::new(RecordId::from("d"), "main://d", "  ")],
        ScriptedFetcher::default().with("main://d", Script::Serve(b"never")),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(10), 1).await;

    assert_eq!(stats.not_downloaded, 1);
    assert!(h.fetcher.calls().is_empty(), "no fetch for incomplete records");
    let error = h.state("d").await.last_error.unwrap();
    assert!(error.starts_with(UNEXPECTED_ERROR_PREFIX), "got {error}");
    assert!(error.contains("secondary"));
    assert_eq!(h.report_rows().await["d"], Outcome::NotDownloaded);
}

#[tokio::test]
async fn missing_primary_is_attributed_to_primary_in_summary() {
    let h = Harness::new(
        vec![Record::new(RecordId::from("d"), "", "backup://d")],
        ScriptedFetcher::default().with("backup://d", Script::Serve(b"never")),
    )
    .await;

    h.coordinator.run(h.store.ids(10), 1).await;

    assert!(h.fetcher.calls().is_empty());
    let state = h.state("d").await;
    assert_eq!(state.attempted, UsedLocation::None);
    let summary = crate::summary::summarize(&h.store, &h.layout, 10)
        .await
        .unwrap();
    let entry = &summary.entries[0];
    assert_eq!(entry.status, crate::types::SummaryStatus::Failed);
    assert_eq!(entry.used_column, crate::types::UsedColumn::Primary);
    assert_eq!(
        entry.error,
        format!("{UNEXPECTED_ERROR_PREFIX}record d has no primary location")
    );
}

#[tokio::test]
async fn attempts_are_tracked_per_location() {
    let h = Harness::new(
        vec![record("both"), record("main")],
        ScriptedFetcher::default()
            .with("main://both", Script::Fail(server_error()))
            .with("backup://both", Script::Fail(server_error()))
            .with("main://main", Script::Serve(b"%PDF")),
    )
    .await;

    h.coordinator.run(h.store.ids(10), 2).await;

    assert_eq!(h.state("both").await.attempted, UsedLocation::Secondary);
    assert_eq!(h.state("main").await.attempted, UsedLocation::Primary);
}

#[tokio::test]
async fn unknown_id_is_reported_without_aborting_others() {
    let h = Harness::new(
        vec![record("a")],
        ScriptedFetcher::default().with("main://a", Script::Serve(b"%PDF")),
    )
    .await;

    let ids = vec![RecordId::from("ghost"), RecordId::from("a")];
    let stats = h.coordinator.run(ids, 2).await;

    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.downloaded, 1);
    assert_eq!(stats.not_downloaded, 1);
    let rows = h.report_rows().await;
    assert_eq!(rows["ghost"], Outcome::NotDownloaded);
    assert_eq!(rows["a"], Outcome::Downloaded);
}

#[tokio::test]
async fn panicking_fetch_is_contained_to_its_record() {
    let h = Harness::new(
        vec![record("boom"), record("fine")],
        ScriptedFetcher::default()
            .with("main://boom", Script::Panic("fetcher exploded"))
            .with("main://fine", Script::Serve(b"%PDF")),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(10), 2).await;

    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.downloaded, 1);
    assert_eq!(stats.not_downloaded, 1);
    let error = h.state("boom").await.last_error.unwrap();
    assert_eq!(
        error,
        format!("{UNEXPECTED_ERROR_PREFIX}worker panicked: fetcher exploded")
    );
    assert_eq!(
        h.state("boom").await.attempted,
        UsedLocation::Primary,
        "panicked during the primary fetch"
    );
    let rows = h.report_rows().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows["boom"], Outcome::NotDownloaded);
}

// -----------------------------------------------------------------------
// Scheduling
// -----------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_worker_count() {
    let records: Vec<_> = (0..12).map(|i| record(&format!("r{i}"))).collect();
    let h = Harness::new(
        records,
        ScriptedFetcher::default().with_delay(Duration::from_millis(40)),
    )
    .await;

    h.coordinator.run(h.store.ids(100), 3).await;

    let max = h.fetcher.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "saw {max} concurrent fetches with 3 workers");
    assert!(max >= 2, "expected parallel fetches, saw {max}");
}

#[tokio::test]
async fn zero_workers_runs_one_at_a_time() {
    let records: Vec<_> = (0..4).map(|i| record(&format!("r{i}"))).collect();
    let h = Harness::new(
        records,
        ScriptedFetcher::default().with_delay(Duration::from_millis(10)),
    )
    .await;

    let stats = h.coordinator.run(h.store.ids(100), 0).await;

    assert_eq!(stats.dispatched, 4);
    assert_eq!(h.fetcher.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn only_dispatched_ids_are_touched() {
    let records: Vec<_> = (0..5).map(|i| record(&format!("r{i}"))).collect();
    let h = Harness::new(records, ScriptedFetcher::default()).await;

    let stats = h.coordinator.run(h.store.ids(2), 4).await;

    assert_eq!(stats.dispatched, 2);
    assert_eq!(h.report_rows().await.len(), 2);
    assert!(h.state("r0").await.processed);
    assert!(h.state("r1").await.processed);
    assert!(!h.state("r2").await.processed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_has_one_header_and_one_row_per_record() {
    let mut fetcher = ScriptedFetcher::default().with_delay(Duration::from_millis(2));
    let mut records = Vec::new();
    for i in 0..40 {
        let id = format!("r{i}");
        if i % 2 == 0 {
            fetcher = fetcher.with(&format!("main://{id}"), Script::Serve(b"%PDF"));
        }
        records.push(record(&id));
    }
    let h = Harness::new(records, fetcher).await;

    let stats = h.coordinator.run(h.store.ids(100), 8).await;

    assert_eq!(stats.downloaded, 20);
    assert_eq!(stats.not_downloaded, 20);
    let text = std::fs::read_to_string(h.report.path()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 41);
    assert_eq!(lines[0], "Name;Result");
    assert_eq!(
        lines.iter().filter(|l| **l == "Name;Result").count(),
        1,
        "header written exactly once"
    );
}

// -----------------------------------------------------------------------
// Events
// -----------------------------------------------------------------------

#[tokio::test]
async fn emits_lifecycle_events() {
    let h = Harness::new(
        vec![record("b")],
        ScriptedFetcher::default()
            .with("main://b", Script::Fail(server_error()))
            .with("backup://b", Script::Serve(b"%PDF")),
    )
    .await;
    let mut events = h.coordinator.subscribe();

    h.coordinator.run(h.store.ids(10), 1).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        seen.first(),
        Some(Event::RunStarted {
            total: 1,
            workers: 1
        })
    ));
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::PrimaryFailed { id, error } if id == "b" && error.contains("500")
    )));
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::RecordFinished {
            outcome: Outcome::Downloaded,
            used: UsedLocation::Secondary,
            ..
        }
    )));
    assert!(matches!(
        seen.last(),
        Some(Event::RunFinished { stats }) if stats.downloaded == 1
    ));
}
