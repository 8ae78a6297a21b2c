//! FIFO download queue with a single worker.
//!
//! The queue drains tasks one at a time in arrival order:
//! - **Admission**: [`DownloadQueue::enqueue`] appends and wakes the worker
//! - **Execution**: exactly one worker loop runs the head task's [`TaskWork`]
//! - **Cancellation**: always at content granularity, or for a whole session
//!
//! A [`ContentLedger`] answers "how many other tasks for this content are
//! still pending", which download jobs use to run post-processing only once
//! the last part of a content item has arrived.

mod ledger;
mod registry;
mod runner;
mod types;
mod work;

pub use ledger::ContentLedger;
pub use registry::{ProcessRegistry, SessionProcesses};
pub use runner::DownloadQueue;
pub use types::{
    CancelCounts, ContentId, ContentSnapshot, ContentSummary, NewTask, QueueSnapshot, QueueStatus,
    SessionId, TaskId, TaskInfo,
};
pub use work::{work_fn, TaskContext, TaskWork, WorkOutcome};
