//! Download requests, the per-download job, and the service that queues them.
//!
//! A [`DownloadService`] resolves a [`DownloadRequest`] against the
//! configured libraries, creates the destination folder and enqueues a
//! [`DownloadJob`]. The job drives the external tool through the
//! [`ProcessRunner`](crate::runner::ProcessRunner), cleans up after failures,
//! and post-processes the content once its last part has arrived, including
//! the directories of earlier parts whose post-processing was deferred.

mod config;
mod deferred;
mod error;
mod job;
mod layout;
mod request;
mod service;

pub use config::DownloadToolConfig;
pub use deferred::DeferredPostProcess;
pub use error::DownloadError;
pub use job::{snapshot_files, DownloadJob, JobEvent, JobOutcome, JobServices};
pub use layout::{content_dir, season_dir};
pub use request::{ContentKind, DownloadRequest};
pub use service::DownloadService;
