//! Mock permission normalizer for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::postprocess::{PermissionError, PermissionNormalizer, PermissionReport};

/// Records the paths it was asked to normalize. Touches nothing on disk.
#[derive(Debug, Default)]
pub struct MockPermissions {
    paths: Arc<RwLock<Vec<PathBuf>>>,
    next_error: Arc<RwLock<Option<PermissionError>>>,
}

impl MockPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_paths(&self) -> Vec<PathBuf> {
        self.paths.read().await.clone()
    }

    pub async fn set_next_error(&self, error: PermissionError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl PermissionNormalizer for MockPermissions {
    async fn apply_permissions(&self, path: &Path) -> Result<PermissionReport, PermissionError> {
        self.paths.write().await.push(path.to_path_buf());
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(PermissionReport {
            updated: 1,
            skipped: 0,
        })
    }
}
