use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A part marker emitted by grouped transfers (`3/12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMarker {
    /// 1-based index of the file currently transferring.
    pub index: u32,
    /// Number of files in the group.
    pub total: u32,
}

/// A progress update forwarded to a [`ProgressSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Effective percentage for the whole task (0-100).
    pub percent: u8,
    /// The output line that produced this update.
    pub line: String,
    /// Current part, when the transfer is grouped and a marker was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<GroupMarker>,
}

/// Error returned by a progress sink. Never aborts the download.
#[derive(Debug, Error)]
#[error("progress sink failed: {0}")]
pub struct ProgressSinkError(pub String);

/// Receiver of progress updates.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, update: ProgressUpdate) -> Result<(), ProgressSinkError>;
}
