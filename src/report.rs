//! Append-only outcome report
//!
//! One delimited row per processed record, preceded by a single
//! `Name<delim>Result` header. The file survives restarts and is only
//! truncated by an explicit [`ReportLog::reset`].
//!
//! Concurrent appends are serialized by one async mutex that spans the
//! "is the file empty?" check and the write, and each append issues a single
//! `write_all` of fully serialized bytes, so headers are never duplicated and
//! rows never interleave.

use crate::config::delimiter_byte;
use crate::error::{Error, Result};
use crate::types::{Outcome, ReportEntry};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Header cells of the report
pub const REPORT_HEADER: [&str; 2] = ["Name", "Result"];

/// Handle to the report file, shared by all workers
#[derive(Debug)]
pub struct ReportLog {
    path: PathBuf,
    delimiter: u8,
    write_lock: Mutex<()>,
}

impl ReportLog {
    /// Report at `path` using `delimiter` between fields
    ///
    /// Fails with [`Error::Config`] unless the delimiter is a single ASCII
    /// byte other than a quote or newline.
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            delimiter: delimiter_byte("report.delimiter", delimiter)?,
            write_lock: Mutex::new(()),
        })
    }

    /// Report file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate (or create) the report
    ///
    /// Call once before any worker starts appending.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::File::create(&self.path).await?;
        tracing::info!(path = ?self.path, "cleared report file");
        Ok(())
    }

    /// Append one `name;result` row, writing the header first if the file is empty
    pub async fn append(&self, name: &str, result: Outcome) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let needs_header = file.metadata().await?.len() == 0;

        let bytes = self.encode_rows(needs_header, name, result)?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        tracing::debug!(name, %result, "wrote report row");
        Ok(())
    }

    /// Parse the report back into entries, skipping the header
    ///
    /// A missing file yields no entries.
    pub async fn entries(&self) -> Result<Vec<ReportEntry>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(raw.as_slice());

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let name = record.get(0).unwrap_or_default().to_string();
            let result = record.get(1).unwrap_or_default();
            let result = Outcome::parse(result).ok_or_else(|| {
                Error::Other(format!("unrecognized report result '{result}' for '{name}'"))
            })?;
            entries.push(ReportEntry { name, result });
        }
        Ok(entries)
    }

    fn encode_rows(&self, with_header: bool, name: &str, result: Outcome) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        if with_header {
            writer.write_record(REPORT_HEADER)?;
        }
        writer.write_record([name, result.as_str()])?;
        writer
            .into_inner()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }
}
