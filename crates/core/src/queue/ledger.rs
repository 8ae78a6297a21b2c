use std::sync::Arc;

use tokio::sync::Mutex;

use super::runner::QueueState;
use super::types::{ContentId, TaskId};

/// Read-only view over the queue state answering content-group questions.
#[derive(Clone)]
pub struct ContentLedger {
    state: Arc<Mutex<QueueState>>,
}

impl ContentLedger {
    pub(super) fn new(state: Arc<Mutex<QueueState>>) -> Self {
        Self { state }
    }

    /// Live tasks sharing `content_id`, excluding `exclude`.
    ///
    /// Counts queued tasks plus the running task when it is not `exclude`,
    /// across all sessions.
    pub async fn pending_siblings(&self, content_id: &ContentId, exclude: TaskId) -> usize {
        self.state.lock().await.pending_for_content(content_id, exclude)
    }
}

impl QueueState {
    pub(super) fn pending_for_content(&self, content_id: &ContentId, exclude: TaskId) -> usize {
        let running = self
            .current
            .as_ref()
            .filter(|c| c.info.id != exclude && &c.info.content_id == content_id)
            .map_or(0, |_| 1);
        let queued = self
            .queue
            .iter()
            .filter(|t| t.info.id != exclude && &t.info.content_id == content_id)
            .count();
        running + queued
    }
}
