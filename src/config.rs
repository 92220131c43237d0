//! Configuration types for fallback-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Names of the manifest columns that carry the record id and its two locations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Column holding the unique record id (default: "BRnum")
    #[serde(default = "default_id_column")]
    pub id: String,

    /// Column holding the preferred location (default: "Pdf_URL")
    #[serde(default = "default_primary_column")]
    pub primary: String,

    /// Column holding the fallback location (default: "Report Html Address")
    #[serde(default = "default_secondary_column")]
    pub secondary: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: default_id_column(),
            primary: default_primary_column(),
            secondary: default_secondary_column(),
        }
    }
}

/// Download behavior (concurrency, batch cap, HTTP timeouts, artifact naming)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Number of concurrent workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of records processed per run (default: 10)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Longest wait for the response headers or for the next body chunk
    /// (default: 10 seconds). A steadily streaming body never times out.
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Extension of downloaded artifacts, without the dot (default: "pdf")
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            limit: default_limit(),
            connect_timeout: default_timeout(),
            read_timeout: default_timeout(),
            artifact_extension: default_artifact_extension(),
            user_agent: default_user_agent(),
        }
    }
}

/// Outcome report settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file name under the output directory (default: "Download_result_report.csv")
    #[serde(default = "default_report_file_name")]
    pub file_name: String,

    /// Field delimiter (default: ';')
    #[serde(default = "default_report_delimiter")]
    pub delimiter: char,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file_name: default_report_file_name(),
            delimiter: default_report_delimiter(),
        }
    }
}

/// Main configuration for [`BatchDownloader`](crate::BatchDownloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path to the delimited manifest file
    pub manifest_path: PathBuf,

    /// Field delimiter of the manifest (default: ',')
    #[serde(default = "default_manifest_delimiter")]
    pub manifest_delimiter: char,

    /// Output root; artifacts land in `<output_dir>/dwn` (default: "output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Manifest column names
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Outcome report settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("manifest.csv"),
            manifest_delimiter: default_manifest_delimiter(),
            output_dir: default_output_dir(),
            columns: ColumnConfig::default(),
            download: DownloadConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file, applying defaults for missing keys
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.download.workers == 0 {
            return Err(Error::config(
                "download.workers",
                "worker count must be at least 1",
            ));
        }

        let ext = &self.download.artifact_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(Error::config(
                "download.artifact_extension",
                format!("'{ext}' is not a bare file extension"),
            ));
        }

        for (key, name) in [
            ("columns.id", &self.columns.id),
            ("columns.primary", &self.columns.primary),
            ("columns.secondary", &self.columns.secondary),
        ] {
            if name.trim().is_empty() {
                return Err(Error::config(key, "column name must not be empty"));
            }
        }

        if self.columns.primary == self.columns.secondary {
            return Err(Error::config(
                "columns.secondary",
                "primary and secondary columns must differ",
            ));
        }

        delimiter_byte("manifest_delimiter", self.manifest_delimiter)?;
        delimiter_byte("report.delimiter", self.report.delimiter)?;

        if self.report.file_name.trim().is_empty() {
            return Err(Error::config(
                "report.file_name",
                "report file name must not be empty",
            ));
        }

        Ok(())
    }
}

/// Delimiters are passed to the CSV reader/writer as a single byte
pub(crate) fn delimiter_byte(key: &str, delimiter: char) -> Result<u8> {
    match u8::try_from(delimiter) {
        Ok(byte) if byte.is_ascii() && !matches!(byte, b'"' | b'\n' | b'\r') => Ok(byte),
        _ => Err(Error::config(
            key,
            format!("{delimiter:?} cannot be used as a field delimiter"),
        )),
    }
}

fn default_id_column() -> String {
    "BRnum".into()
}

fn default_primary_column() -> String {
    "Pdf_URL".into()
}

fn default_secondary_column() -> String {
    "Report Html Address".into()
}

fn default_workers() -> usize {
    4
}

fn default_limit() -> usize {
    10
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_artifact_extension() -> String {
    "pdf".into()
}

fn default_user_agent() -> String {
    concat!("fallback-dl/", env!("CARGO_PKG_VERSION")).into()
}

fn default_report_file_name() -> String {
    "Download_result_report.csv".into()
}

fn default_report_delimiter() -> char {
    ';'
}

fn default_manifest_delimiter() -> char {
    ','
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
