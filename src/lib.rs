//! # fallback-dl
//!
//! Batch document downloader with per-record fallback.
//!
//! A manifest lists records, each with a primary and a secondary location.
//! A bounded pool of workers fetches every record from its primary location,
//! falls back to the secondary one on failure, and appends one outcome row per
//! record to a delimited report. A summary pass then classifies each record
//! from the files actually on disk.
//!
//! ## Design Philosophy
//!
//! - **Per-record failure** - a failed or panicking record never aborts the batch
//! - **Sensible defaults** - only the manifest path is required
//! - **Library-first** - no CLI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use fallback_dl::{BatchDownloader, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         manifest_path: "GRI_2017_2020.csv".into(),
//!         output_dir: "output".into(),
//!         ..Default::default()
//!     };
//!
//!     let downloader = BatchDownloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let stats = downloader.run().await?;
//!     println!("{} of {} downloaded", stats.downloaded, stats.dispatched);
//!     println!("{}", downloader.summarize().await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact removal
pub mod cleanup;
/// Configuration types
pub mod config;
/// Bounded worker pool running the fetch-with-fallback protocol
pub mod coordinator;
/// Batch downloader facade
pub mod downloader;
/// Error types
pub mod error;
/// Single-location fetch
pub mod fetcher;
/// Output directory layout
pub mod layout;
/// Manifest loading
pub mod manifest;
/// Outcome report
pub mod report;
/// Record store
pub mod store;
/// Post-run summary
pub mod summary;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cleanup::CleanupReport;
pub use config::{ColumnConfig, Config, DownloadConfig, ReportConfig};
pub use coordinator::DownloadCoordinator;
pub use downloader::BatchDownloader;
pub use error::{Error, FetchError, FetchErrorKind, ManifestError, Result};
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher};
pub use layout::OutputLayout;
pub use report::ReportLog;
pub use store::{Record, RecordState, RecordStore};
pub use summary::Summary;
pub use types::{
    Event, Outcome, RecordId, ReportEntry, RunStats, SummaryEntry, SummaryStatus, UsedColumn,
    UsedLocation,
};
