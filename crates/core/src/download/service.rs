//! Front door for download requests.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::postprocess::{
    movie_base_name, FsPermissionNormalizer, LibraryPostProcessor, PermissionNormalizer,
    PostProcessRequest, PostProcessor,
};
use crate::queue::{CancelCounts, DownloadQueue, NewTask, SessionId, TaskId};
use crate::runner::ProcessRunner;

use super::deferred::DeferredPostProcess;
use super::error::DownloadError;
use super::job::{DownloadJob, JobEvent, JobServices};
use super::layout::{content_dir, season_dir};
use super::request::DownloadRequest;

const EVENT_CAPACITY: usize = 256;

/// Resolves requests against the configured libraries and queues them.
pub struct DownloadService {
    config: Arc<Config>,
    queue: DownloadQueue,
    services: JobServices,
}

impl DownloadService {
    /// Build a service with the filesystem post-processor and permission
    /// normalizer from `config`.
    pub fn new(config: Config) -> Self {
        let runner = ProcessRunner::new(config.runner.clone(), config.progress.clone());
        let post_processor = LibraryPostProcessor::new(config.post_process.clone());
        let permissions = FsPermissionNormalizer::new(config.permissions.clone());
        Self::with_components(
            config,
            DownloadQueue::new(),
            Arc::new(runner),
            Arc::new(post_processor),
            Arc::new(permissions),
        )
    }

    pub fn with_components(
        config: Config,
        queue: DownloadQueue,
        runner: Arc<ProcessRunner>,
        post_processor: Arc<dyn PostProcessor>,
        permissions: Arc<dyn PermissionNormalizer>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config: Arc::new(config),
            queue,
            services: JobServices {
                runner,
                post_processor,
                permissions,
                events,
                deferred: DeferredPostProcess::new(),
            },
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    /// Subscribe to job events. Slow subscribers miss events rather than
    /// stalling downloads.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.services.events.subscribe()
    }

    /// Queue a download. Returns the 1-based queue position and the task id.
    pub async fn submit(&self, request: DownloadRequest) -> Result<(usize, TaskId), DownloadError> {
        let library = self
            .config
            .library(&request.library)
            .ok_or_else(|| DownloadError::UnknownLibrary(request.library.clone()))?;

        if request.uri.trim().is_empty() {
            return Err(DownloadError::invalid("link is empty"));
        }
        if request.title.trim().is_empty() {
            return Err(DownloadError::invalid("title is empty"));
        }
        if request.season.is_some() && !library.kind.is_series() {
            return Err(DownloadError::invalid(format!(
                "library '{}' holds {}, seasons do not apply",
                library.name, library.kind
            )));
        }

        let content_root = content_dir(&library.root, &request.title, request.year);
        let destination = match request.season {
            Some(season) => season_dir(&content_root, season),
            None => content_root.clone(),
        };
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|source| DownloadError::Io {
                path: destination.clone(),
                source,
            })?;
        self.ensure_tool_home().await;

        let content_title = movie_base_name(&request.title, request.year);
        let command =
            self.config
                .download
                .build_command(&request.uri, &destination, request.grouped);
        let post_process = PostProcessRequest {
            path: destination.clone(),
            title: content_title.clone(),
            season_hint: request.season,
            kind: library.kind,
            year: request.year,
        };

        let content_key = content_root.to_string_lossy().into_owned();
        let task = NewTask::new(
            request.session.clone(),
            request.label(),
            destination.to_string_lossy(),
        )
        .with_content(content_key.clone(), content_title, content_key);

        let job = DownloadJob::new(self.services.clone(), command, &destination, post_process);
        let (position, task_id) = self.queue.enqueue(task, Box::new(job)).await;

        info!(
            session = %request.session,
            task_id = %task_id,
            position,
            destination = %destination.display(),
            "Download queued"
        );
        Ok((position, task_id))
    }

    /// Cancel a single content item through one of its tasks.
    pub async fn cancel(&self, session: &SessionId, task_id: TaskId) -> CancelCounts {
        self.queue.cancel_task(session, task_id).await
    }

    /// Cancel everything a session has queued or running.
    pub async fn cancel_session(&self, session: &SessionId) -> CancelCounts {
        self.queue.cancel_session(session).await
    }

    /// Cancel every session with live tasks. Used on shutdown.
    pub async fn cancel_all(&self) -> CancelCounts {
        let snapshot = self.queue.snapshot(None).await;
        let sessions: HashSet<SessionId> = snapshot
            .current
            .iter()
            .chain(snapshot.queued.iter())
            .map(|task| task.session_id.clone())
            .collect();

        let mut total = CancelCounts::default();
        for session in sessions {
            let counts = self.queue.cancel_session(&session).await;
            total.running += counts.running;
            total.queued += counts.queued;
        }
        total
    }

    async fn ensure_tool_home(&self) {
        let Some(home) = &self.config.download.home_dir else {
            return;
        };
        if let Err(e) = tokio::fs::create_dir_all(home).await {
            warn!(path = %home.display(), error = %e, "Could not create tool home directory");
        }
    }
}
