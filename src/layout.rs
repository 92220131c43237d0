//! Output directory layout and artifact naming
//!
//! ```text
//! <output_root>/
//! ├── Download_result_report.csv
//! └── dwn/
//!     ├── <record-id>.pdf
//!     └── ...
//! ```

use crate::types::RecordId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the artifact subdirectory under the output root
pub const ARTIFACT_DIR_NAME: &str = "dwn";

/// Suffix of the in-progress file a fetch writes before renaming into place
pub const PARTIAL_SUFFIX: &str = "part";

/// Resolved paths for one output root
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
    artifact_dir: PathBuf,
    extension: String,
    report_file_name: String,
}

impl OutputLayout {
    /// Build the layout for `root`, naming artifacts `<id>.<extension>`
    pub fn new(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
        report_file_name: impl Into<String>,
    ) -> Self {
        let root = root.into();
        Self {
            artifact_dir: root.join(ARTIFACT_DIR_NAME),
            root,
            extension: extension.into(),
            report_file_name: report_file_name.into(),
        }
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one artifact per downloaded record
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Artifact extension, without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<root>/dwn/<id>.<ext>`
    pub fn artifact_path(&self, id: &RecordId) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}", id.as_str(), self.extension))
    }

    /// Outcome report location
    pub fn report_path(&self) -> PathBuf {
        self.root.join(&self.report_file_name)
    }

    /// Create the output root and artifact directory if missing
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        tracing::debug!(artifact_dir = ?self.artifact_dir, "output layout ready");
        Ok(())
    }

    /// Whether `path` names a finished artifact of this layout
    pub fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }

    /// Ids whose artifact already exists on disk
    ///
    /// A missing artifact directory yields an empty set.
    pub async fn existing_artifact_ids(&self) -> std::io::Result<HashSet<RecordId>> {
        let mut ids = HashSet::new();
        let mut entries = match tokio::fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !self.is_artifact(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(RecordId::new(stem));
            }
        }

        Ok(ids)
    }
}

/// Check whether a record id can be used verbatim as a file stem
///
/// Rejects empty ids, `.` and `..`, and anything containing a path separator
/// or NUL byte.
///
/// # Examples
///
/// ```
/// use fallback_dl::layout::is_safe_record_id;
///
/// assert!(is_safe_record_id("BR-2017-0042"));
/// assert!(!is_safe_record_id("../etc/passwd"));
/// assert!(!is_safe_record_id(""));
/// ```
#[must_use]
pub fn is_safe_record_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

/// In-progress sibling of an artifact path: `<id>.<ext>.part`
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root: &Path) -> OutputLayout {
        OutputLayout::new(root, "pdf", "Download_result_report.csv")
    }

    #[test]
    fn artifact_and_report_paths() {
        let layout = layout(Path::new("/out"));

        assert_eq!(
            layout.artifact_path(&RecordId::from("BR1")),
            PathBuf::from("/out/dwn/BR1.pdf")
        );
        assert_eq!(
            layout.report_path(),
            PathBuf::from("/out/Download_result_report.csv")
        );
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/out/dwn/BR1.pdf")),
            PathBuf::from("/out/dwn/BR1.pdf.part")
        );
    }

    #[test]
    fn unsafe_ids_are_rejected() {
        assert!(is_safe_record_id("a.b.c"));
        assert!(!is_safe_record_id("."));
        assert!(!is_safe_record_id(".."));
        assert!(!is_safe_record_id("dir/file"));
        assert!(!is_safe_record_id("dir\\file"));
        assert!(!is_safe_record_id("nul\0byte"));
    }

    #[tokio::test]
    async fn prepare_creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp.path().join("a/b"));

        layout.prepare().await.unwrap();

        assert!(layout.artifact_dir().is_dir());
        // idempotent
        layout.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn existing_ids_only_counts_finished_artifacts() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        layout.prepare().await.unwrap();
        let dir = layout.artifact_dir();
        std::fs::write(dir.join("done.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.join("also.done.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.join("half.pdf.part"), b"%P").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.join("folder.pdf")).unwrap();

        let ids = layout.existing_artifact_ids().await.unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&RecordId::from("done")));
        assert!(ids.contains(&RecordId::from("also.done")));
    }

    #[tokio::test]
    async fn existing_ids_of_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp.path().join("never-created"));

        assert!(layout.existing_artifact_ids().await.unwrap().is_empty());
    }
}
