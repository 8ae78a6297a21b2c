//! Error types for the runner module.

use thiserror::Error;

/// Errors returned by [`ProcessRunner::run`](super::ProcessRunner::run).
///
/// A download that fails after all attempts is not an error: `run` returns
/// `Ok(false)` for it.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The caller cancelled the run.
    #[error("Download cancelled")]
    Cancelled,

    /// The command has no program to execute.
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// The process-wide tool slot is no longer available.
    #[error("Download tool slot closed")]
    SlotClosed,
}

impl RunnerError {
    pub fn invalid_command(reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
