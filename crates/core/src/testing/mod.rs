//! Testing utilities and mock implementations.
//!
//! Mocks for the post-processing seams plus fixtures for driving the queue
//! deterministically, so tests never need the real download tool.
//!
//! # Example
//!
//! ```rust,ignore
//! use plexdl_core::testing::{fixtures, MockPostProcessor, RecordingSink};
//!
//! let log = fixtures::RunLog::new();
//! let (work, release) = fixtures::held_work(log.clone(), "first");
//! queue.enqueue(fixtures::task("s1", "first", "content-a"), work).await;
//! release.complete();
//! ```

mod mock_permissions;
mod mock_post_processor;
mod recording_sink;

pub use mock_permissions::MockPermissions;
pub use mock_post_processor::{MockPostProcessor, RecordedPostProcess};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{oneshot, Mutex};

    use crate::config::{Config, LibraryConfig};
    use crate::download::{ContentKind, DownloadToolConfig};
    use crate::postprocess::PermissionsConfig;
    use crate::queue::{work_fn, DownloadQueue, NewTask, SessionId, TaskId, TaskWork, WorkOutcome};
    use crate::runner::RunnerConfig;

    const WAIT_LIMIT: Duration = Duration::from_secs(5);

    /// A task whose content is identified by `content`.
    pub fn task(session: &str, label: &str, content: &str) -> NewTask {
        NewTask::new(session, label, format!("/downloads/{}", content)).with_content(
            content,
            content,
            format!("/downloads/{}", content),
        )
    }

    /// Shared, ordered record of what work units did.
    #[derive(Debug, Clone, Default)]
    pub struct RunLog {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl RunLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn push(&self, entry: impl Into<String>) {
            self.entries.lock().await.push(entry.into());
        }

        pub async fn entries(&self) -> Vec<String> {
            self.entries.lock().await.clone()
        }

        /// Names of work units that started, in order.
        pub async fn started(&self) -> Vec<String> {
            self.entries
                .lock()
                .await
                .iter()
                .filter_map(|e| e.strip_prefix("start ").map(String::from))
                .collect()
        }
    }

    /// Finishes a [`held_work`] unit. Dropping it completes the work.
    pub struct Release(oneshot::Sender<WorkOutcome>);

    impl Release {
        pub fn complete(self) {
            let _ = self.0.send(WorkOutcome::Completed);
        }

        pub fn fail(self) {
            let _ = self.0.send(WorkOutcome::Failed);
        }
    }

    /// Work that logs `start <name>`, then waits for its [`Release`] or for
    /// cancellation, and logs `end <name> <outcome>`.
    pub fn held_work(log: RunLog, name: &str) -> (Box<dyn TaskWork>, Release) {
        let (tx, rx) = oneshot::channel();
        let name = name.to_string();
        let work = work_fn(move |ctx| async move {
            log.push(format!("start {}", name)).await;
            let outcome = tokio::select! {
                _ = ctx.cancel.cancelled() => WorkOutcome::Cancelled,
                result = rx => result.unwrap_or(WorkOutcome::Completed),
            };
            log.push(format!("end {} {}", name, outcome.as_str())).await;
            outcome
        });
        (work, Release(tx))
    }

    /// Work that logs `start <name>` and completes immediately.
    pub fn instant_work(log: RunLog, name: &str) -> Box<dyn TaskWork> {
        let name = name.to_string();
        work_fn(move |_| async move {
            log.push(format!("start {}", name)).await;
            WorkOutcome::Completed
        })
    }

    /// Wait until `task_id` is the running task.
    pub async fn wait_until_running(queue: &DownloadQueue, task_id: TaskId) {
        wait_for(queue, |status| status.running == Some(task_id)).await;
    }

    /// Wait until nothing is running and nothing is queued.
    pub async fn wait_until_idle(queue: &DownloadQueue) {
        wait_for(queue, |status| status.running.is_none() && status.queued == 0).await;
    }

    async fn wait_for(queue: &DownloadQueue, done: impl Fn(&crate::queue::QueueStatus) -> bool) {
        let polled = tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                if done(&queue.status().await) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(polled.is_ok(), "queue did not reach the expected state");
    }

    /// Config with one library per kind under `root`, driving `program` with
    /// no default arguments, a single attempt and permissions disabled.
    pub fn config(root: &Path, program: &str) -> Config {
        Config {
            download: DownloadToolConfig::for_program(program),
            runner: RunnerConfig::default().with_retries(1),
            permissions: PermissionsConfig::disabled(),
            libraries: ContentKind::ALL
                .iter()
                .map(|kind| LibraryConfig::new(kind.as_str(), *kind, root.join(kind.as_str())))
                .collect(),
            ..Config::default()
        }
    }

    pub fn session(id: &str) -> SessionId {
        SessionId::new(id)
    }
}
