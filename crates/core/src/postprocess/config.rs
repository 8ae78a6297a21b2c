//! Post-processing configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Archive extraction and renaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Extract `.zip` and `.rar` archives found in the download directory.
    #[serde(default = "default_true")]
    pub extract_archives: bool,

    /// Delete archive volumes after a successful extraction.
    #[serde(default = "default_true")]
    pub remove_archives: bool,

    /// Path to the `unrar` binary.
    #[serde(default = "default_unrar_path")]
    pub unrar_path: PathBuf,

    /// Rename episodes of series-like content to `SxxEyy - Title.ext`.
    #[serde(default = "default_true")]
    pub rename_episodes: bool,

    /// Rename movie files to `Title (Year).ext` when the year is known.
    #[serde(default = "default_true")]
    pub rename_movies: bool,
}

fn default_true() -> bool {
    true
}

fn default_unrar_path() -> PathBuf {
    PathBuf::from("unrar")
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            extract_archives: true,
            remove_archives: true,
            unrar_path: default_unrar_path(),
            rename_episodes: true,
            rename_movies: true,
        }
    }
}

/// Ownership and mode applied to downloaded content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_owner")]
    pub uid: u32,

    #[serde(default = "default_owner")]
    pub gid: u32,

    /// Mode for directories (default `0o755`).
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,

    /// Mode for files (default `0o644`).
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

fn default_owner() -> u32 {
    1000
}

fn default_dir_mode() -> u32 {
    0o755
}

fn default_file_mode() -> u32 {
    0o644
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uid: default_owner(),
            gid: default_owner(),
            dir_mode: default_dir_mode(),
            file_mode: default_file_mode(),
        }
    }
}

impl PermissionsConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }
}
