//! Error types for configuration, fetching, and output.

use std::path::PathBuf;

use thiserror::Error;

/// Problems found in a spider configuration before any page is fetched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config field: {0}")]
    MissingField(&'static str),
    #[error("Unsupported spider mode: {0}")]
    UnsupportedMode(String),
    #[error("Unsupported pagination type: {0}")]
    UnsupportedPagination(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),
    #[error("Invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single page fetch that did not produce usable content.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Timed out after {secs}s waiting for {url}")]
    Timeout { url: String, secs: u64 },
    #[error("Failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("API error from {url}: {message}")]
    Api { url: String, message: String },
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Operation not supported by this fetcher: {0}")]
    Unsupported(&'static str),
}

/// Failure writing a result set to disk.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Errors that stop a crawl before it starts.
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to provision fetcher: {0}")]
    Provision(#[source] FetchError),
}
