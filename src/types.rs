//! Core types for fallback-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a manifest record; also the artifact file stem
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new RecordId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of a record's two locations produced (or was blamed for) its artifact
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsedLocation {
    /// Not processed yet, or neither location succeeded
    #[default]
    None,
    /// The primary location succeeded
    Primary,
    /// The primary failed and the secondary succeeded
    Secondary,
}

/// Terminal classification of one processed record, as written to the report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// One of the two locations was fetched
    #[serde(rename = "Downloaded")]
    Downloaded,
    /// Both locations failed
    #[serde(rename = "Not downloaded")]
    NotDownloaded,
}

impl Outcome {
    /// Report-file spelling of this outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Downloaded => "Downloaded",
            Outcome::NotDownloaded => "Not downloaded",
        }
    }

    /// Parse the report-file spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Downloaded" => Some(Outcome::Downloaded),
            "Not downloaded" => Some(Outcome::NotDownloaded),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the outcome report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Record id
    pub name: String,
    /// What happened to it
    pub result: Outcome,
}

/// Summary status of a record, judged from the filesystem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryStatus {
    /// Artifact exists on disk
    Success,
    /// Artifact is missing
    Failed,
}

impl std::fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryStatus::Success => f.write_str("Success"),
            SummaryStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// Which manifest column a summary line attributes the result to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsedColumn {
    /// The primary location column
    Primary,
    /// The secondary location column
    Secondary,
}

impl std::fmt::Display for UsedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsedColumn::Primary => f.write_str("Primary"),
            UsedColumn::Secondary => f.write_str("Secondary"),
        }
    }
}

/// Per-record line of a [`Summary`](crate::summary::Summary)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Record id
    pub id: RecordId,
    /// Success if the artifact exists
    pub status: SummaryStatus,
    /// Column the result is attributed to
    pub used_column: UsedColumn,
    /// Last stored error; empty on success
    pub error: String,
}

/// Statistics for one coordinator run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Records handed to workers
    pub dispatched: usize,
    /// Records reported as Downloaded
    pub downloaded: usize,
    /// Records reported as Not downloaded (including panicked workers)
    pub not_downloaded: usize,
    /// Worker tasks that panicked
    pub panicked: usize,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
    /// Monotonic run duration
    pub elapsed: Duration,
}

/// Events emitted during a run
///
/// Subscribe via [`BatchDownloader::subscribe`](crate::BatchDownloader::subscribe).
/// Events are best-effort: with no subscribers they are dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run was dispatched
    RunStarted {
        /// Number of records in the batch
        total: usize,
        /// Worker pool size
        workers: usize,
    },

    /// A worker picked up a record
    RecordStarted {
        /// Record id
        id: RecordId,
    },

    /// The primary attempt failed and the secondary is about to be tried
    PrimaryFailed {
        /// Record id
        id: RecordId,
        /// Primary diagnostic
        error: String,
    },

    /// A record reached its terminal outcome
    RecordFinished {
        /// Record id
        id: RecordId,
        /// Outcome written to the report
        outcome: Outcome,
        /// Location that produced the artifact
        used: UsedLocation,
    },

    /// All workers joined
    RunFinished {
        /// Run statistics
        stats: RunStats,
    },
}
