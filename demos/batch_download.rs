//! Batch download example
//!
//! Mirrors a typical session:
//! - Load a manifest and skip records already on disk
//! - Subscribe to events
//! - Download the first records with a worker pool
//! - Print the summary, then delete the artifacts again
//!
//! ```bash
//! cargo run --example batch_download -- reports.csv output
//! ```

use fallback_dl::config::{Config, DownloadConfig};
use fallback_dl::{BatchDownloader, Event, Outcome, UsedLocation};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let manifest_path = args.next().unwrap_or_else(|| "reports.csv".to_string());
    let output_dir = args.next().unwrap_or_else(|| "output".to_string());

    // Build configuration
    let config = Config {
        manifest_path: manifest_path.into(),
        output_dir: output_dir.into(),
        download: DownloadConfig {
            workers: 4,
            limit: 10,
            ..Default::default()
        },
        ..Default::default()
    };

    // Create downloader instance
    let downloader = BatchDownloader::new(config).await?;
    println!("{} records to download", downloader.store().len());

    // Subscribe to events
    let mut events = downloader.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::PrimaryFailed { id, error } => {
                    println!("↻ {}: primary failed ({}), trying secondary", id, error);
                }
                Event::RecordFinished {
                    id,
                    outcome: Outcome::Downloaded,
                    used,
                } => {
                    let source = match used {
                        UsedLocation::Secondary => "secondary",
                        _ => "primary",
                    };
                    println!("✓ {} downloaded from {}", id, source);
                }
                Event::RecordFinished { id, .. } => {
                    println!("✗ {} not downloaded", id);
                }
                Event::RunFinished { stats } => {
                    println!(
                        "Downloaded with {} records in {:.2} seconds",
                        stats.dispatched,
                        stats.elapsed.as_secs_f64()
                    );
                    break;
                }
                _ => {}
            }
        }
    });

    let stats = downloader.run().await?;
    printer.await?;
    println!(
        "{} downloaded, {} not downloaded",
        stats.downloaded, stats.not_downloaded
    );

    println!("{}", downloader.summarize().await?);
    println!("Report written to {:?}", downloader.report().path());

    let removed = downloader.delete_downloaded_files().await?;
    println!("Cleanup: {}", removed);

    Ok(())
}
