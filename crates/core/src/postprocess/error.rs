//! Error types for the postprocess module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while post-processing a directory.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// The directory to process does not exist.
    #[error("Directory not found: {path}")]
    NotFound { path: PathBuf },

    /// A zip archive could not be read or extracted.
    #[error("Failed to extract {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// An external extraction tool failed.
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker died.
    #[error("Post-processing task failed: {0}")]
    TaskFailed(String),
}

impl PostProcessError {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while normalizing permissions.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The path does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// The blocking worker died.
    #[error("Permission task failed: {0}")]
    TaskFailed(String),
}
