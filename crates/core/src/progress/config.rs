//! Progress reporting configuration.

use serde::{Deserialize, Serialize};

/// Rate limiting and grouped-reset settings for progress reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Forward an update when the percentage advanced by at least this much.
    #[serde(default = "default_min_step")]
    pub min_step: u8,

    /// Forward an update when at least this much time passed since the last one.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// In grouped mode, a local percentage at or below this value...
    #[serde(default = "default_reset_floor")]
    pub reset_floor: u8,

    /// ...following one at or above this value marks the start of the next file.
    #[serde(default = "default_reset_ceiling")]
    pub reset_ceiling: u8,
}

fn default_min_step() -> u8 {
    2
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_reset_floor() -> u8 {
    5
}

fn default_reset_ceiling() -> u8 {
    95
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_step: default_min_step(),
            min_interval_ms: default_min_interval_ms(),
            reset_floor: default_reset_floor(),
            reset_ceiling: default_reset_ceiling(),
        }
    }
}
