//! Download queue implementation.
//!
//! All queue/current mutations and snapshot reads happen under one mutex.
//! The worker loop holds it only while popping or clearing a task, never
//! while the task's work runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics;

use super::ledger::ContentLedger;
use super::registry::ProcessRegistry;
use super::types::{
    CancelCounts, ContentId, ContentSnapshot, ContentSummary, NewTask, QueueSnapshot, QueueStatus,
    SessionId, TaskId, TaskInfo,
};
use super::work::{TaskContext, TaskWork, WorkOutcome};

pub(super) struct QueuedTask {
    pub(super) info: TaskInfo,
    work: Box<dyn TaskWork>,
}

pub(super) struct RunningTask {
    pub(super) info: TaskInfo,
    cancel: CancellationToken,
    /// Flips to `true` once the worker has cleared this task.
    done: watch::Receiver<bool>,
}

#[derive(Default)]
pub(crate) struct QueueState {
    pub(super) queue: VecDeque<QueuedTask>,
    pub(super) current: Option<RunningTask>,
    worker_active: bool,
}

struct Inner {
    state: Arc<Mutex<QueueState>>,
    registry: ProcessRegistry,
    next_id: AtomicU64,
}

/// FIFO queue executing one task at a time.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Inner>,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::with_registry(ProcessRegistry::new())
    }

    pub fn with_registry(registry: ProcessRegistry) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(Mutex::new(QueueState::default())),
                registry,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.inner.registry
    }

    pub fn ledger(&self) -> ContentLedger {
        ContentLedger::new(self.inner.state.clone())
    }

    /// Append a task and make sure the worker is running.
    ///
    /// Returns the 1-based position among queued (not running) tasks at the
    /// time of the call, and the new task's id.
    pub async fn enqueue(&self, task: NewTask, work: Box<dyn TaskWork>) -> (usize, TaskId) {
        let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let info = TaskInfo::from_new(id, task, Utc::now());

        let mut state = self.inner.state.lock().await;
        info!(
            task_id = %id,
            session = %info.session_id,
            content = %info.content_id,
            label = %info.label,
            "Task enqueued"
        );
        state.queue.push_back(QueuedTask { info, work });
        let position = state.queue.len();
        metrics::TASKS_ENQUEUED.inc();
        metrics::QUEUE_DEPTH.set(position as i64);
        self.ensure_worker_locked(&mut state);

        (position, id)
    }

    /// Cancel the content item owning `task_id`, for that session only.
    ///
    /// Every task of the session sharing the content id is removed; if the
    /// running task is among them it is cancelled and awaited before this
    /// returns. Unknown ids and ids of other sessions cancel nothing.
    pub async fn cancel_task(&self, session: &SessionId, task_id: TaskId) -> CancelCounts {
        let (content_id, running, queued) = {
            let mut state = self.inner.state.lock().await;

            let content_id = state
                .current
                .as_ref()
                .map(|c| &c.info)
                .into_iter()
                .chain(state.queue.iter().map(|t| &t.info))
                .find(|t| t.id == task_id && &t.session_id == session)
                .map(|t| t.content_id.clone());
            let Some(content_id) = content_id else {
                return CancelCounts::default();
            };

            let queued = remove_queued(&mut state, |t| {
                &t.session_id == session && t.content_id == content_id
            });
            let running = cancel_current(&state, |t| {
                &t.session_id == session && t.content_id == content_id
            });
            (content_id, running, queued)
        };

        let counts = CancelCounts {
            running: usize::from(running.is_some()),
            queued,
        };
        if let Some(done) = running {
            wait_done(done).await;
        }

        record_cancel("content", counts);
        info!(
            session = %session,
            task_id = %task_id,
            content = %content_id,
            running = counts.running,
            queued = counts.queued,
            "Content cancelled"
        );

        if !counts.is_empty() {
            self.ensure_worker().await;
        }
        counts
    }

    /// Cancel everything belonging to a session.
    ///
    /// Registered processes of the session are force-killed as well, and the
    /// worker is always re-armed afterwards.
    pub async fn cancel_session(&self, session: &SessionId) -> CancelCounts {
        let (running, queued) = {
            let mut state = self.inner.state.lock().await;
            let queued = remove_queued(&mut state, |t| &t.session_id == session);
            let running = cancel_current(&state, |t| &t.session_id == session);
            (running, queued)
        };

        let targeted = self.inner.registry.kill_session(session);

        let counts = CancelCounts {
            running: usize::from(running.is_some()),
            queued,
        };
        if let Some(done) = running {
            wait_done(done).await;
        }
        // Tasks of this session started during the wait keep their pids.
        self.inner.registry.forget(session, &targeted);

        record_cancel("session", counts);
        info!(
            session = %session,
            running = counts.running,
            queued = counts.queued,
            "Session cancelled"
        );

        self.ensure_worker().await;
        counts
    }

    /// Copy of the running and queued tasks, optionally for one session.
    pub async fn snapshot(&self, session: Option<&SessionId>) -> QueueSnapshot {
        let state = self.inner.state.lock().await;
        QueueSnapshot {
            current: state
                .current
                .as_ref()
                .filter(|c| c.info.belongs_to(session))
                .map(|c| c.info.clone()),
            queued: state
                .queue
                .iter()
                .filter(|t| t.info.belongs_to(session))
                .map(|t| t.info.clone())
                .collect(),
        }
    }

    /// The queue grouped by content item.
    ///
    /// The running summary covers the running task and its queued siblings.
    /// Queued summaries group the queued tasks in first-seen order.
    pub async fn snapshot_by_content(&self, session: Option<&SessionId>) -> ContentSnapshot {
        let state = self.inner.state.lock().await;

        let running = state
            .current
            .as_ref()
            .filter(|c| c.info.belongs_to(session))
            .map(|c| {
                let mut summary = ContentSummary::from_task(&c.info, true);
                for task in state.queue.iter().map(|t| &t.info).filter(|t| {
                    t.session_id == c.info.session_id && t.content_id == c.info.content_id
                }) {
                    summary.add_queued(task);
                }
                summary
            });

        let mut queued: Vec<ContentSummary> = Vec::new();
        for task in state
            .queue
            .iter()
            .map(|t| &t.info)
            .filter(|t| t.belongs_to(session))
        {
            match queued
                .iter_mut()
                .find(|s| s.content_id == task.content_id && s.session_id == task.session_id)
            {
                Some(summary) => summary.add_queued(task),
                None => queued.push(ContentSummary::from_task(task, false)),
            }
        }

        ContentSnapshot { running, queued }
    }

    /// Live tasks sharing `content_id`, other than `exclude`.
    pub async fn pending_for_content(&self, content_id: &ContentId, exclude: TaskId) -> usize {
        self.inner
            .state
            .lock()
            .await
            .pending_for_content(content_id, exclude)
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock().await;
        QueueStatus {
            queued: state.queue.len(),
            running: state.current.as_ref().map(|c| c.info.id),
            worker_active: state.worker_active,
        }
    }

    /// Start a worker if tasks are waiting and none is active.
    pub async fn ensure_worker(&self) {
        let mut state = self.inner.state.lock().await;
        self.ensure_worker_locked(&mut state);
    }

    fn ensure_worker_locked(&self, state: &mut QueueState) {
        if state.worker_active || state.queue.is_empty() {
            return;
        }
        state.worker_active = true;
        let queue = self.clone();
        tokio::spawn(async move { queue.worker_loop().await });
    }

    async fn worker_loop(self) {
        loop {
            let (info, work, cancel, done_tx) = {
                let mut state = self.inner.state.lock().await;
                let Some(next) = state.queue.pop_front() else {
                    state.worker_active = false;
                    metrics::QUEUE_DEPTH.set(0);
                    return;
                };
                let cancel = CancellationToken::new();
                let (done_tx, done_rx) = watch::channel(false);
                state.current = Some(RunningTask {
                    info: next.info.clone(),
                    cancel: cancel.clone(),
                    done: done_rx,
                });
                metrics::QUEUE_DEPTH.set(state.queue.len() as i64);
                (next.info, next.work, cancel, done_tx)
            };

            info!(task_id = %info.id, label = %info.label, "Task started");
            let ctx = TaskContext {
                processes: self.inner.registry.observer(info.session_id.clone()),
                info: info.clone(),
                cancel: cancel.clone(),
                ledger: self.ledger(),
            };

            let started = Instant::now();
            // Run in its own task so a panic only fails this task.
            let (outcome, label) = match tokio::spawn(work.run(ctx)).await {
                Ok(outcome) => (outcome, outcome.as_str()),
                Err(e) => {
                    error!(task_id = %info.id, error = %e, "Task panicked");
                    (WorkOutcome::Failed, "panicked")
                }
            };
            metrics::TASKS_FINISHED.with_label_values(&[label]).inc();
            metrics::TASK_DURATION
                .with_label_values(&[label])
                .observe(started.elapsed().as_secs_f64());
            info!(task_id = %info.id, result = label, "Task finished");

            let mut state = self.inner.state.lock().await;
            state.current = None;
            let _ = done_tx.send(true);

            if outcome == WorkOutcome::Cancelled {
                state.worker_active = false;
                if !cancel.is_cancelled() {
                    // Nobody asked for this cancel, so no cancel path will re-arm us.
                    warn!(task_id = %info.id, "Task cancelled itself, restarting worker");
                    self.ensure_worker_locked(&mut state);
                }
                return;
            }
        }
    }
}

fn remove_queued(state: &mut QueueState, matches: impl Fn(&TaskInfo) -> bool) -> usize {
    let before = state.queue.len();
    state.queue.retain(|t| !matches(&t.info));
    let removed = before - state.queue.len();
    if removed > 0 {
        metrics::QUEUE_DEPTH.set(state.queue.len() as i64);
    }
    removed
}

/// Cancel the running task if it matches, returning its completion signal.
fn cancel_current(
    state: &QueueState,
    matches: impl Fn(&TaskInfo) -> bool,
) -> Option<watch::Receiver<bool>> {
    let current = state.current.as_ref().filter(|c| matches(&c.info))?;
    current.cancel.cancel();
    Some(current.done.clone())
}

async fn wait_done(mut done: watch::Receiver<bool>) {
    // Err means the worker dropped the sender, which also means it is done.
    let _ = done.wait_for(|finished| *finished).await;
}

fn record_cancel(scope: &str, counts: CancelCounts) {
    if counts.running > 0 {
        metrics::TASKS_CANCELLED
            .with_label_values(&[scope, "running"])
            .inc_by(counts.running as u64);
    }
    if counts.queued > 0 {
        metrics::TASKS_CANCELLED
            .with_label_values(&[scope, "queued"])
            .inc_by(counts.queued as u64);
    }
}
