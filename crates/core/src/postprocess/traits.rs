//! Trait definitions for the postprocess module.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::download::ContentKind;

use super::error::{PermissionError, PostProcessError};

/// What to post-process and how to name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessRequest {
    /// Directory the download landed in.
    pub path: PathBuf,
    /// Content title used for renaming.
    pub title: String,
    /// Season used when file names only carry an episode number.
    pub season_hint: Option<u32>,
    pub kind: ContentKind,
    pub year: Option<u32>,
}

/// Summary of a post-processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessReport {
    pub archives_extracted: usize,
    pub archives_failed: usize,
    pub files_renamed: usize,
}

/// Summary of a permission pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionReport {
    /// Entries whose owner and mode were applied.
    pub updated: usize,
    /// Entries that could not be updated.
    pub skipped: usize,
}

/// Extraction and renaming of a finished download directory.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Returns the name of this post-processor implementation.
    fn name(&self) -> &str;

    /// Process the directory. Per-file problems are logged and counted in
    /// the report; an error means the pass could not run at all.
    async fn process_directory(
        &self,
        request: &PostProcessRequest,
    ) -> Result<PostProcessReport, PostProcessError>;
}

/// Best-effort ownership and mode normalization.
#[async_trait]
pub trait PermissionNormalizer: Send + Sync {
    async fn apply_permissions(&self, path: &Path) -> Result<PermissionReport, PermissionError>;
}
