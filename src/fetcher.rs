//! Single-location HTTP fetch
//!
//! A [`Fetcher`] performs one GET and streams the body into a destination
//! file. It never returns an [`Error`](crate::Error): every failure is a
//! [`FetchError`] the coordinator records against the record.
//!
//! The body is written to `<destination>.part` and renamed into place only
//! after the last chunk is flushed, so an existing destination always means a
//! complete download.

use crate::config::DownloadConfig;
use crate::error::{FetchError, Result};
use crate::layout::partial_path;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

/// Bytes written on success, tagged failure otherwise
pub type FetchOutcome = std::result::Result<u64, FetchError>;

/// Abstraction over fetching one location into a file, enabling testability.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `location` and store the body at `destination`
    async fn fetch(&self, location: &str, destination: &Path) -> FetchOutcome;
}

/// Production [`Fetcher`] backed by a shared `reqwest::Client`.
///
/// There is no overall deadline: the wait for the response headers and the
/// wait for each body chunk are bounded separately by the read timeout, so a
/// large document that keeps streaming is never cut off.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpFetcher {
    /// Build a client with the configured timeouts and user agent
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            read_timeout: config.read_timeout,
        })
    }

    /// Use an already configured client
    pub fn with_client(client: reqwest::Client, read_timeout: Duration) -> Self {
        Self {
            client,
            read_timeout,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &str, destination: &Path) -> FetchOutcome {
        let url = parse_location(location)?;

        let mut response = timeout(self.read_timeout, self.client.get(url).send())
            .await
            .map_err(|_| read_timed_out(self.read_timeout, "response headers"))??;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(location, status = status.as_u16(), "non-200 response");
            return Err(FetchError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let partial = partial_path(destination);
        let written = match stream_body(&mut response, &partial, self.read_timeout).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            discard_partial(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(location, ?destination, bytes = written, "fetched");
        Ok(written)
    }
}

fn read_timed_out(limit: Duration, waiting_for: &str) -> FetchError {
    FetchError::Timeout(format!(
        "no {waiting_for} within {:.1}s",
        limit.as_secs_f64()
    ))
}

/// Accept only absolute http(s) URLs
fn parse_location(location: &str) -> std::result::Result<url::Url, FetchError> {
    let url = url::Url::parse(location.trim())
        .map_err(|e| FetchError::InvalidLocation(format!("'{location}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidLocation(format!(
            "'{location}': unsupported scheme '{other}'"
        ))),
    }
}

/// Copy the response body chunk by chunk into `path`
///
/// Each chunk must arrive within `read_timeout` of the previous one.
async fn stream_body(
    response: &mut reqwest::Response,
    path: &Path,
    read_timeout: Duration,
) -> FetchOutcome {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = timeout(read_timeout, response.chunk())
        .await
        .map_err(|_| read_timed_out(read_timeout, "body data"))??
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to remove partial download");
        }
    }
}
