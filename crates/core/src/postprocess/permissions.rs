//! Ownership and mode normalization for downloaded content.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::metrics;

use super::config::PermissionsConfig;
use super::error::PermissionError;
use super::traits::{PermissionNormalizer, PermissionReport};

/// Applies the configured owner and modes to a directory tree.
///
/// Every failure is logged and counted; a pass never aborts halfway.
pub struct FsPermissionNormalizer {
    config: PermissionsConfig,
}

impl FsPermissionNormalizer {
    pub fn new(config: PermissionsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }
}

fn apply_tree(config: &PermissionsConfig, root: &Path) -> PermissionReport {
    let mut report = PermissionReport::default();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                report.skipped += 1;
                continue;
            }
        };
        let is_dir = entry.file_type().is_dir();
        match apply_one(config, entry.path(), is_dir) {
            Ok(()) => report.updated += 1,
            Err(e) if entry.depth() == 0 => {
                warn!(path = %entry.path().display(), error = %e, "Could not normalize permissions");
                report.skipped += 1;
            }
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Could not normalize permissions");
                report.skipped += 1;
            }
        }
    }
    report
}

#[cfg(unix)]
fn apply_one(config: &PermissionsConfig, path: &Path, is_dir: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::os::unix::fs::chown(path, Some(config.uid), Some(config.gid))?;
    let mode = if is_dir {
        config.dir_mode
    } else {
        config.file_mode
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_one(_config: &PermissionsConfig, _path: &Path, _is_dir: bool) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl PermissionNormalizer for FsPermissionNormalizer {
    async fn apply_permissions(&self, path: &Path) -> Result<PermissionReport, PermissionError> {
        if !self.config.enabled {
            return Ok(PermissionReport::default());
        }
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PermissionError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let config = self.config.clone();
        let root = path.to_path_buf();
        let report = match tokio::task::spawn_blocking(move || apply_tree(&config, &root)).await {
            Ok(report) => report,
            Err(e) => {
                metrics::PERMISSION_FIXES.with_label_values(&["failed"]).inc();
                return Err(PermissionError::TaskFailed(e.to_string()));
            }
        };

        let result = if report.skipped == 0 { "ok" } else { "partial" };
        metrics::PERMISSION_FIXES.with_label_values(&[result]).inc();
        info!(
            path = %path.display(),
            updated = report.updated,
            skipped = report.skipped,
            "Permissions normalized"
        );
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn current_owner() -> PermissionsConfig {
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        PermissionsConfig::default().with_owner(uid, gid)
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn test_modes_applied() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("Season 01");
        fs::create_dir(&sub).unwrap();
        let file = sub.join("S01E01 - Show.mkv");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o700)).unwrap();

        let normalizer = FsPermissionNormalizer::new(current_owner());
        let report = normalizer.apply_permissions(dir.path()).await.unwrap();

        assert_eq!(report.updated, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(mode_of(&sub), 0o755);
        assert_eq!(mode_of(&file), 0o644);
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mkv");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).unwrap();

        let normalizer = FsPermissionNormalizer::new(PermissionsConfig::disabled());
        let report = normalizer.apply_permissions(dir.path()).await.unwrap();

        assert_eq!(report, PermissionReport::default());
        assert_eq!(mode_of(&file), 0o600);
    }

    #[tokio::test]
    async fn test_missing_path() {
        let normalizer = FsPermissionNormalizer::new(current_owner());
        let result = normalizer
            .apply_permissions(Path::new("/nonexistent/plexdl"))
            .await;
        assert!(matches!(result, Err(PermissionError::NotFound { .. })));
    }
}
