//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Queue (admission, completion, cancellation)
//! - Runner (tool attempts, idle timeouts, forced kills)
//! - Post-processing (runs, gated skips, permission fixes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Queue
// =============================================================================

/// Tasks admitted to the queue.
pub static TASKS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("plexdl_tasks_enqueued_total", "Total tasks enqueued").unwrap()
});

/// Tasks that finished running, by outcome.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plexdl_tasks_finished_total", "Total tasks finished"),
        &["result"], // "completed", "failed", "cancelled", "panicked"
    )
    .unwrap()
});

/// Tasks cancelled by a user request, by scope and state.
pub static TASKS_CANCELLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plexdl_tasks_cancelled_total", "Total tasks cancelled"),
        &["scope", "state"], // scope: "content", "session"; state: "running", "queued"
    )
    .unwrap()
});

/// Tasks currently waiting in the queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("plexdl_queue_depth", "Tasks waiting in the queue").unwrap()
});

/// Task run time in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("plexdl_task_duration_seconds", "Duration of a task run")
            .buckets(vec![1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Runner
// =============================================================================

/// Download tool attempts by result.
pub static PROCESS_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plexdl_process_attempts_total",
            "Total download tool attempts",
        ),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Attempts killed because the tool went silent.
pub static IDLE_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plexdl_idle_timeouts_total",
        "Download attempts terminated after producing no output",
    )
    .unwrap()
});

/// Processes force-killed through the session registry.
pub static FORCED_KILLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plexdl_forced_kills_total",
        "Processes killed with SIGKILL on session cancel",
    )
    .unwrap()
});

// =============================================================================
// Post-processing
// =============================================================================

/// Post-processing decisions by result.
pub static POST_PROCESS_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plexdl_post_process_total",
            "Post-processing passes by result",
        ),
        &["result"], // "run", "skipped", "failed"
    )
    .unwrap()
});

/// Permission normalization passes by result.
pub static PERMISSION_FIXES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plexdl_permission_fixes_total",
            "Permission normalization passes by result",
        ),
        &["result"], // "ok", "partial", "failed"
    )
    .unwrap()
});

/// Files removed after a failed download.
pub static PARTIAL_FILES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plexdl_partial_files_removed_total",
        "Files removed after a failed download",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queue
        Box::new(TASKS_ENQUEUED.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASKS_CANCELLED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(TASK_DURATION.clone()),
        // Runner
        Box::new(PROCESS_ATTEMPTS.clone()),
        Box::new(IDLE_TIMEOUTS.clone()),
        Box::new(FORCED_KILLS.clone()),
        // Post-processing
        Box::new(POST_PROCESS_RUNS.clone()),
        Box::new(PERMISSION_FIXES.clone()),
        Box::new(PARTIAL_FILES_REMOVED.clone()),
    ]
}
