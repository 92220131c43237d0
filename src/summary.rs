//! Post-run summary of the first N records
//!
//! Success is judged from the filesystem, not from the report: a record
//! succeeded iff its artifact exists. The attributed column comes from the
//! record's [`UsedLocation`].

use crate::error::{Error, Result};
use crate::layout::OutputLayout;
use crate::store::{RecordState, RecordStore};
use crate::types::{RecordId, SummaryEntry, SummaryStatus, UsedColumn, UsedLocation};
use serde::Serialize;
use std::fmt;

/// Per-record classification plus aggregate counts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// One entry per summarized record, in store order
    pub entries: Vec<SummaryEntry>,
    /// Successful records fetched from the primary location
    pub main_used: usize,
    /// Successful records fetched from the secondary location
    pub secondary_used: usize,
    /// Records without an artifact
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Download Summary:")?;
        for entry in &self.entries {
            writeln!(
                f,
                "ID: {}, Status: {}, Used: {}, Error: {}",
                entry.id, entry.status, entry.used_column, entry.error
            )?;
        }
        write!(
            f,
            "Main used: {}, Secondary used: {}, Failed: {}",
            self.main_used, self.secondary_used, self.failed
        )
    }
}

/// Classify the first `limit` records of `store`
///
/// Fails with [`Error::StoreNotLoaded`] if the store was never populated and
/// with [`Error::MissingDirectory`] if the artifact directory is absent.
pub async fn summarize(store: &RecordStore, layout: &OutputLayout, limit: usize) -> Result<Summary> {
    if !store.is_loaded() {
        return Err(Error::StoreNotLoaded);
    }
    let artifact_dir = layout.artifact_dir();
    if !tokio::fs::try_exists(artifact_dir).await? {
        return Err(Error::MissingDirectory {
            path: artifact_dir.to_path_buf(),
        });
    }

    let mut summary = Summary::default();
    for record in store.iter().take(limit) {
        let state = record.state().await;
        let exists = tokio::fs::try_exists(layout.artifact_path(&record.id)).await?;
        let entry = classify(record.id.clone(), &state, exists);

        match (entry.status, entry.used_column) {
            (SummaryStatus::Success, UsedColumn::Primary) => summary.main_used += 1,
            (SummaryStatus::Success, UsedColumn::Secondary) => summary.secondary_used += 1,
            (SummaryStatus::Failed, _) => summary.failed += 1,
        }

        tracing::info!(
            record_id = %entry.id,
            status = %entry.status,
            used = %entry.used_column,
            error = %entry.error,
            "summary"
        );
        summary.entries.push(entry);
    }

    tracing::info!(
        main_used = summary.main_used,
        secondary_used = summary.secondary_used,
        failed = summary.failed,
        "download summary"
    );
    Ok(summary)
}

fn classify(id: RecordId, state: &RecordState, artifact_exists: bool) -> SummaryEntry {
    let used_column = match state.used {
        UsedLocation::Primary => UsedColumn::Primary,
        UsedLocation::Secondary => UsedColumn::Secondary,
        // Failed: blame the last location actually fetched
        UsedLocation::None => match state.attempted {
            UsedLocation::Secondary => UsedColumn::Secondary,
            UsedLocation::Primary | UsedLocation::None => UsedColumn::Primary,
        },
    };

    if artifact_exists {
        SummaryEntry {
            id,
            status: SummaryStatus::Success,
            used_column,
            error: String::new(),
        }
    } else {
        SummaryEntry {
            id,
            status: SummaryStatus::Failed,
            used_column,
            error: state.last_error.clone().unwrap_or_default(),
        }
    }
}
