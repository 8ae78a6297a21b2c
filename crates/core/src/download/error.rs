use std::path::PathBuf;
use thiserror::Error;

/// Errors returned when a download request cannot be queued.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No library named '{0}'")]
    UnknownLibrary(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Could not create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
