//! Types for the download queue.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a queued task. Unique for the lifetime of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The requesting chat or console session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Shared by every task that belongs to the same logical content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Metadata for a task about to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub session_id: SessionId,
    pub label: String,
    pub destination: String,
    pub content_id: ContentId,
    pub content_label: String,
    pub content_destination: String,
}

impl NewTask {
    /// A single-part task whose content is its own destination.
    pub fn new(
        session_id: impl Into<SessionId>,
        label: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let destination = destination.into();
        Self {
            session_id: session_id.into(),
            content_id: ContentId::new(destination.clone()),
            content_label: label.clone(),
            content_destination: destination.clone(),
            label,
            destination,
        }
    }

    pub fn with_content(
        mut self,
        content_id: impl Into<String>,
        content_label: impl Into<String>,
        content_destination: impl Into<String>,
    ) -> Self {
        self.content_id = ContentId::new(content_id);
        self.content_label = content_label.into();
        self.content_destination = content_destination.into();
        self
    }
}

/// Read-only copy of a task's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub session_id: SessionId,
    pub label: String,
    pub destination: String,
    pub content_id: ContentId,
    pub content_label: String,
    pub content_destination: String,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskInfo {
    pub(crate) fn from_new(id: TaskId, task: NewTask, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id: task.session_id,
            label: task.label,
            destination: task.destination,
            content_id: task.content_id,
            content_label: task.content_label,
            content_destination: task.content_destination,
            enqueued_at,
        }
    }

    pub(crate) fn belongs_to(&self, session: Option<&SessionId>) -> bool {
        session.map_or(true, |s| &self.session_id == s)
    }
}

/// Number of tasks removed by a cancel call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCounts {
    /// 1 if the running task was cancelled.
    pub running: usize,
    /// Queued tasks removed.
    pub queued: usize,
}

impl CancelCounts {
    pub fn total(&self) -> usize {
        self.running + self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Task-level view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub current: Option<TaskInfo>,
    pub queued: Vec<TaskInfo>,
}

/// Aggregated view of all live tasks for one content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub content_id: ContentId,
    pub session_id: SessionId,
    pub label: String,
    pub destination: String,
    pub total: usize,
    pub queued: usize,
    pub running: bool,
    /// Lowest task id in the group, used as a handle for cancellation.
    pub representative_task_id: TaskId,
}

impl ContentSummary {
    pub(crate) fn from_task(task: &TaskInfo, running: bool) -> Self {
        Self {
            content_id: task.content_id.clone(),
            session_id: task.session_id.clone(),
            label: task.content_label.clone(),
            destination: task.content_destination.clone(),
            total: 1,
            queued: usize::from(!running),
            running,
            representative_task_id: task.id,
        }
    }

    pub(crate) fn add_queued(&mut self, task: &TaskInfo) {
        self.total += 1;
        self.queued += 1;
        self.representative_task_id = self.representative_task_id.min(task.id);
    }

    /// Tasks still waiting to run for this content.
    pub fn pending(&self) -> usize {
        self.total - usize::from(self.running)
    }
}

/// Content-level view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub running: Option<ContentSummary>,
    pub queued: Vec<ContentSummary>,
}

/// Counters describing the queue's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: Option<TaskId>,
    pub worker_active: bool,
}
