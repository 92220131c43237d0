//! Removal of previously downloaded artifacts

use crate::error::Result;
use crate::layout::OutputLayout;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome of a cleanup pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Artifacts found in the artifact directory
    pub found: usize,
    /// Artifacts actually removed
    pub deleted: usize,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} deleted", self.deleted, self.found)
    }
}

/// Delete every artifact in the layout's artifact directory
///
/// Only regular files with the artifact extension are touched. Failures on
/// individual files are logged as warnings and skipped. A missing directory
/// is not an error and yields `0 of 0`.
///
/// Must not run concurrently with a download run over the same layout.
pub async fn delete_all_artifacts(layout: &OutputLayout) -> Result<CleanupReport> {
    use tokio::fs;

    let artifact_dir = layout.artifact_dir();
    let mut entries = match fs::read_dir(artifact_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?artifact_dir, "artifact directory does not exist, skipping cleanup");
            return Ok(CleanupReport::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut targets: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_file = match entry.file_type().await {
            Ok(t) => t.is_file(),
            Err(e) => {
                warn!(?path, error = %e, "failed to stat entry");
                continue;
            }
        };
        if is_file && layout.is_artifact(&path) {
            targets.push(path);
        }
    }

    let mut report = CleanupReport {
        found: targets.len(),
        deleted: 0,
    };
    for file in &targets {
        match fs::remove_file(file).await {
            Ok(()) => {
                debug!(?file, "deleted artifact");
                report.deleted += 1;
            }
            Err(e) => {
                warn!(?file, error = %e, "failed to delete artifact");
            }
        }
    }

    info!(
        found = report.found,
        deleted = report.deleted,
        ?artifact_dir,
        "cleanup complete"
    );
    Ok(report)
}
