//! Runner configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and timeout settings for the download tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of attempts per download (at least 1).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between attempts (seconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Kill the process when it prints nothing for this long (seconds).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Number of trailing output lines kept for diagnostics.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,

    /// Number of trailing lines logged when an attempt fails.
    #[serde(default = "default_failure_tail_lines")]
    pub failure_tail_lines: usize,
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

fn default_tail_lines() -> usize {
    50
}

fn default_failure_tail_lines() -> usize {
    8
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
            idle_timeout_secs: default_idle_timeout(),
            tail_lines: default_tail_lines(),
            failure_tail_lines: default_failure_tail_lines(),
        }
    }
}

impl RunnerConfig {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, secs: u64) -> Self {
        self.retry_delay_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
