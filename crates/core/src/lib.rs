pub mod config;
pub mod download;
pub mod metrics;
pub mod postprocess;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LibraryConfig,
};
pub use download::{
    ContentKind, DeferredPostProcess, DownloadError, DownloadJob, DownloadRequest, DownloadService,
    DownloadToolConfig, JobEvent, JobOutcome,
};
pub use postprocess::{
    FsPermissionNormalizer, LibraryPostProcessor, PermissionError, PermissionNormalizer,
    PermissionReport, PermissionsConfig, PostProcessConfig, PostProcessError, PostProcessReport,
    PostProcessRequest, PostProcessor,
};
pub use progress::{ProgressConfig, ProgressSink, ProgressTracker, ProgressUpdate};
pub use queue::{
    CancelCounts, ContentId, ContentLedger, ContentSnapshot, ContentSummary, DownloadQueue,
    NewTask, ProcessRegistry, QueueSnapshot, SessionId, TaskContext, TaskId, TaskInfo, TaskWork,
    WorkOutcome,
};
pub use runner::{ProcessRunner, RunHooks, RunnerConfig, RunnerError, ToolCommand};
