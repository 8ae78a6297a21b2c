//! External download-tool process runner.
//!
//! Every invocation goes through one process-wide slot, so at most one
//! download process is alive at any time. The runner streams the combined
//! stdout/stderr of the child, feeds it to a [`ProgressTracker`](crate::progress::ProgressTracker),
//! enforces an idle timeout and retries failed attempts with a fixed delay.

mod config;
mod error;
mod process;
mod types;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use process::{kill_pid, ProcessRunner};
pub use types::{OutputTail, ProcessObserver, RunHooks, ToolCommand};
