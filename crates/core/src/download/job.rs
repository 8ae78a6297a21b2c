//! The work unit run by the queue for one download.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::deferred::DeferredPostProcess;

use crate::metrics;
use crate::postprocess::{PermissionNormalizer, PostProcessRequest, PostProcessor};
use crate::progress::{ProgressSink, ProgressSinkError, ProgressUpdate};
use crate::queue::{SessionId, TaskContext, TaskId, TaskWork, WorkOutcome};
use crate::runner::{ProcessRunner, RunHooks, ToolCommand};

/// How a download job ended, as reported to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { post_processed: bool },
    Failed { removed_files: usize },
    Cancelled,
}

/// Lifecycle events of a download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Started {
        task_id: TaskId,
        session_id: SessionId,
        label: String,
    },
    Progress {
        task_id: TaskId,
        session_id: SessionId,
        label: String,
        update: ProgressUpdate,
    },
    Finished {
        task_id: TaskId,
        session_id: SessionId,
        label: String,
        destination: PathBuf,
        outcome: JobOutcome,
    },
}

impl JobEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Started { task_id, .. }
            | Self::Progress { task_id, .. }
            | Self::Finished { task_id, .. } => *task_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Started { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::Finished { session_id, .. } => session_id,
        }
    }
}

/// Forwards tracker updates as [`JobEvent::Progress`]. Never blocks.
struct EventProgressSink {
    events: broadcast::Sender<JobEvent>,
    task_id: TaskId,
    session_id: SessionId,
    label: String,
}

#[async_trait]
impl ProgressSink for EventProgressSink {
    async fn on_progress(&self, update: ProgressUpdate) -> Result<(), ProgressSinkError> {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent::Progress {
            task_id: self.task_id,
            session_id: self.session_id.clone(),
            label: self.label.clone(),
            update,
        });
        Ok(())
    }
}

/// Collaborators shared by every job of a service.
#[derive(Clone)]
pub struct JobServices {
    pub runner: Arc<ProcessRunner>,
    pub post_processor: Arc<dyn PostProcessor>,
    pub permissions: Arc<dyn PermissionNormalizer>,
    pub events: broadcast::Sender<JobEvent>,
    pub deferred: DeferredPostProcess,
}

/// Downloads one link into `destination`, then post-processes it.
pub struct DownloadJob {
    services: JobServices,
    command: ToolCommand,
    destination: PathBuf,
    post_process: PostProcessRequest,
}

impl DownloadJob {
    pub fn new(
        services: JobServices,
        command: ToolCommand,
        destination: impl Into<PathBuf>,
        post_process: PostProcessRequest,
    ) -> Self {
        Self {
            services,
            command,
            destination: destination.into(),
            post_process,
        }
    }

    fn finish(&self, ctx: &TaskContext, outcome: JobOutcome) {
        let _ = self.services.events.send(JobEvent::Finished {
            task_id: ctx.info.id,
            session_id: ctx.info.session_id.clone(),
            label: ctx.info.label.clone(),
            destination: self.destination.clone(),
            outcome,
        });
    }

    /// Remove files that appeared since `before`. Returns the number removed.
    async fn remove_new_files(&self, before: HashSet<PathBuf>) -> usize {
        let after = snapshot_files(&self.destination).await;
        let mut fresh: Vec<PathBuf> = after.difference(&before).cloned().collect();
        fresh.sort();

        let mut removed = 0;
        for path in fresh {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %path.display(), error = %e, "Could not delete partial file"),
            }
        }
        metrics::PARTIAL_FILES_REMOVED.inc_by(removed as u64);
        removed
    }

    /// Run post-processing unless other parts of the same content are pending.
    ///
    /// A gated part is deferred. The last part to complete processes every
    /// deferred directory of the content as well as its own.
    async fn post_process(&self, ctx: &TaskContext) -> bool {
        let content_id = &ctx.info.content_id;
        let pending = ctx.pending_siblings().await;
        if pending > 0 {
            info!(
                path = %self.destination.display(),
                pending,
                "Deferring post-processing, more parts of this content are pending"
            );
            metrics::POST_PROCESS_RUNS.with_label_values(&["skipped"]).inc();
            self.services
                .deferred
                .defer(content_id, self.post_process.clone());
            return false;
        }

        let mut requests = self.services.deferred.take(content_id);
        requests.retain(|r| r.path != self.post_process.path);
        requests.push(self.post_process.clone());

        let mut all_ok = true;
        for request in &requests {
            all_ok &= self.run_post_processor(request).await;
        }
        all_ok
    }

    /// After a failed part, process what earlier parts deferred if nothing
    /// else of the content is left to trigger it.
    async fn flush_deferred(&self, ctx: &TaskContext) {
        if ctx.pending_siblings().await > 0 {
            return;
        }
        for request in self.services.deferred.take(&ctx.info.content_id) {
            self.run_post_processor(&request).await;
        }
    }

    async fn run_post_processor(&self, request: &PostProcessRequest) -> bool {
        match self.services.post_processor.process_directory(request).await {
            Ok(_) => {
                metrics::POST_PROCESS_RUNS.with_label_values(&["run"]).inc();
                true
            }
            Err(e) => {
                error!(
                    processor = self.services.post_processor.name(),
                    path = %request.path.display(),
                    error = %e,
                    "Post-processing failed"
                );
                metrics::POST_PROCESS_RUNS.with_label_values(&["failed"]).inc();
                false
            }
        }
    }
}

#[async_trait]
impl TaskWork for DownloadJob {
    async fn run(self: Box<Self>, ctx: TaskContext) -> WorkOutcome {
        let _ = self.services.events.send(JobEvent::Started {
            task_id: ctx.info.id,
            session_id: ctx.info.session_id.clone(),
            label: ctx.info.label.clone(),
        });

        let before = snapshot_files(&self.destination).await;

        let sink = Arc::new(EventProgressSink {
            events: self.services.events.clone(),
            task_id: ctx.info.id,
            session_id: ctx.info.session_id.clone(),
            label: ctx.info.label.clone(),
        });
        let hooks = RunHooks::new(ctx.cancel.clone())
            .with_progress(sink)
            .with_observer(ctx.processes.clone());

        let ok = match self.services.runner.run(&self.command, hooks).await {
            Ok(ok) => ok,
            Err(e) if e.is_cancelled() => {
                info!(task_id = %ctx.info.id, label = %ctx.info.label, "Download cancelled");
                self.finish(&ctx, JobOutcome::Cancelled);
                return WorkOutcome::Cancelled;
            }
            Err(e) => {
                error!(task_id = %ctx.info.id, error = %e, "Download could not run");
                false
            }
        };

        if !ok {
            let removed_files = self.remove_new_files(before).await;
            error!(
                path = %self.destination.display(),
                removed_files,
                "Download failed; skipped post-processing"
            );
            self.flush_deferred(&ctx).await;
            self.finish(&ctx, JobOutcome::Failed { removed_files });
            return WorkOutcome::Failed;
        }

        let post_processed = self.post_process(&ctx).await;

        if let Err(e) = self
            .services
            .permissions
            .apply_permissions(&self.destination)
            .await
        {
            warn!(path = %self.destination.display(), error = %e, "Permission fix failed");
        }

        info!(task_id = %ctx.info.id, label = %ctx.info.label, post_processed, "Download finished");
        self.finish(&ctx, JobOutcome::Completed { post_processed });
        WorkOutcome::Completed
    }
}

/// Every regular file under `root`. Missing roots yield an empty set.
pub async fn snapshot_files(root: &Path) -> HashSet<PathBuf> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect::<HashSet<PathBuf>>()
    })
    .await
    .unwrap_or_default()
}
