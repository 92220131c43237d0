//! Error types for fallback-dl
//!
//! This module provides the error handling for the library:
//! - [`Error`], the crate-wide error returned from fallible operations
//! - [`ManifestError`] for problems loading the input manifest
//! - [`FetchError`], the tagged per-attempt failure produced by a fetcher
//!
//! Fetch failures never surface as [`Error`]: they are recorded against the
//! record that produced them and the batch carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fallback-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fallback-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.workers")
        key: Option<String>,
    },

    /// The input manifest could not be loaded
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// An operation needed loaded records but the store was never populated
    #[error("record store has not been loaded")]
    StoreNotLoaded,

    /// A directory the operation depends on does not exist
    #[error("directory does not exist: {}", path.display())]
    MissingDirectory {
        /// The directory that was expected to exist
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited table (manifest or report) read/write error
    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    /// Network client construction error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error is a precondition failure (bad input or missing state)
    /// rather than an operational fault
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::Manifest(_)
                | Error::StoreNotLoaded
                | Error::MissingDirectory { .. }
        )
    }
}

/// Errors raised while loading the input manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file does not exist
    #[error("manifest file does not exist at {}", path.display())]
    NotFound {
        /// The path that was looked up
        path: PathBuf,
    },

    /// Manifest file exists but cannot be read or parsed
    #[error("manifest {} is unreadable or corrupt: {reason}", path.display())]
    Unreadable {
        /// The manifest path
        path: PathBuf,
        /// Underlying reader error text
        reason: String,
    },

    /// A required column is absent from the header row
    #[error("missing required column: {column}")]
    MissingColumn {
        /// The configured column name that was not found
        column: String,
    },

    /// The same record id appears more than once
    #[error("duplicate record id '{id}' at row {row}")]
    DuplicateId {
        /// The repeated id
        id: String,
        /// 1-based data row of the second occurrence
        row: usize,
    },

    /// A record id cannot be used as an artifact file name
    #[error("record id '{id}' at row {row} is not a valid file name")]
    InvalidId {
        /// The offending id
        id: String,
        /// 1-based data row
        row: usize,
    },
}

/// Category of a failed fetch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Server answered with a status other than 200
    Status,
    /// Connect or read timeout elapsed
    Timeout,
    /// Could not establish a connection
    Connection,
    /// Transport/protocol failure (request, redirect, or body error)
    Protocol,
    /// Local filesystem error while writing the artifact
    Io,
    /// The location is not a fetchable http(s) URL
    InvalidLocation,
    /// Anything else
    Unexpected,
}

/// A single failed fetch attempt
///
/// The `Display` form is the diagnostic stored against a record. Every variant
/// starts with `Failed to download` so report consumers can grep for it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Non-200 HTTP status
    #[error("Failed to download: {code} - {reason}")]
    Status {
        /// Numeric status code
        code: u16,
        /// Canonical reason phrase (empty if unknown)
        reason: String,
    },

    /// Timeout
    #[error("Failed to download (timeout): {0}")]
    Timeout(String),

    /// Connection error
    #[error("Failed to download (connection error): {0}")]
    Connection(String),

    /// Transport/protocol error
    #[error("Failed to download (protocol error): {0}")]
    Protocol(String),

    /// Local I/O error
    #[error("Failed to download (I/O error): {0}")]
    Io(String),

    /// Location could not be parsed as an http(s) URL
    #[error("Failed to download (invalid location): {0}")]
    InvalidLocation(String),

    /// Unexpected error
    #[error("Failed to download (unexpected error): {0}")]
    Unexpected(String),
}

impl FetchError {
    /// The category of this failure
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Status { .. } => FetchErrorKind::Status,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Connection(_) => FetchErrorKind::Connection,
            FetchError::Protocol(_) => FetchErrorKind::Protocol,
            FetchError::Io(_) => FetchErrorKind::Io,
            FetchError::InvalidLocation(_) => FetchErrorKind::InvalidLocation,
            FetchError::Unexpected(_) => FetchErrorKind::Unexpected,
        }
    }

    /// Whether the remote side (rather than the local machine) is to blame
    pub fn is_remote(&self) -> bool {
        matches!(
            self.kind(),
            FetchErrorKind::Status
                | FetchErrorKind::Timeout
                | FetchErrorKind::Connection
                | FetchErrorKind::Protocol
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_connect() {
            FetchError::Connection(e.to_string())
        } else if e.is_request() || e.is_body() || e.is_decode() || e.is_redirect() {
            FetchError::Protocol(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidLocation(e.to_string())
        } else {
            FetchError::Unexpected(e.to_string())
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Io(e.to_string())
    }
}
