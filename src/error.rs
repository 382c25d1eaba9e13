use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NiqueryError {
    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),

    #[error("remote returned status {status} for {url}")]
    RemoteStatus { status: u16, url: String },

    #[error("failed to decode image header: {0}")]
    Decode(String),

    #[error("unsupported remote source: {0}")]
    #[diagnostic(help("use s3://<bucket> or an http(s):// base URL"))]
    UnsupportedRemote(String),

    #[error("location not supported by this reader: {0}")]
    UnsupportedLocation(String),

    #[error("contribution threshold must be positive, got {0}")]
    InvalidThreshold(usize),

    #[error("separator must be a single ASCII character, got {0:?}")]
    InvalidSeparator(char),

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("failed to read table {path}: {message}")]
    TableRead { path: String, message: String },

    #[error("failed to write table {path}: {message}")]
    TableWrite { path: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to set up logging: {0}")]
    Logging(String),
}

impl NiqueryError {
    /// Whether the error came from talking to a remote source.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            NiqueryError::RemoteFetch(_) | NiqueryError::RemoteStatus { .. }
        )
    }
}
