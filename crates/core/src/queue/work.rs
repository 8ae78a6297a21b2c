//! The unit of work a task runs once it reaches the head of the queue.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ledger::ContentLedger;
use super::registry::SessionProcesses;
use super::types::TaskInfo;

/// How a task's work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    Failed,
    /// Cancellation propagated out of the work. Stops the worker loop; the
    /// cancel path decides whether a new loop is needed.
    Cancelled,
}

impl WorkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything a running task may use, handed over by the worker.
#[derive(Clone)]
pub struct TaskContext {
    pub info: TaskInfo,
    /// Fires when the task is cancelled through the queue.
    pub cancel: CancellationToken,
    pub ledger: ContentLedger,
    /// Registers spawned process ids for forced session kills.
    pub processes: Arc<SessionProcesses>,
}

impl TaskContext {
    /// Other live tasks (queued, or running and not this one) for this
    /// task's content, across all sessions.
    pub async fn pending_siblings(&self) -> usize {
        self.ledger
            .pending_siblings(&self.info.content_id, self.info.id)
            .await
    }
}

/// A unit of work run at most once by the queue worker.
#[async_trait]
pub trait TaskWork: Send {
    async fn run(self: Box<Self>, ctx: TaskContext) -> WorkOutcome;
}

struct FnWork<F>(F);

#[async_trait]
impl<F, Fut> TaskWork for FnWork<F>
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = WorkOutcome> + Send + 'static,
{
    async fn run(self: Box<Self>, ctx: TaskContext) -> WorkOutcome {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as [`TaskWork`].
pub fn work_fn<F, Fut>(f: F) -> Box<dyn TaskWork>
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = WorkOutcome> + Send + 'static,
{
    Box::new(FnWork(f))
}
