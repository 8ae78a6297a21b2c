//! Library post-processor: archive extraction followed by renaming.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::download::ContentKind;

use super::config::PostProcessConfig;
use super::error::PostProcessError;
use super::extract::extract_archives;
use super::naming::{rename_episodes, rename_movies};
use super::traits::{PostProcessReport, PostProcessRequest, PostProcessor};

/// Post-processor that prepares a download directory for a media library.
pub struct LibraryPostProcessor {
    config: PostProcessConfig,
}

impl LibraryPostProcessor {
    pub fn new(config: PostProcessConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(PostProcessConfig::default())
    }

    fn process_blocking(
        config: &PostProcessConfig,
        request: &PostProcessRequest,
    ) -> PostProcessReport {
        let mut report = PostProcessReport::default();

        if config.extract_archives {
            let extracted =
                extract_archives(&request.path, &config.unrar_path, config.remove_archives);
            report.archives_extracted = extracted.extracted;
            report.archives_failed = extracted.failed;
        }

        if request.kind.is_series() {
            if config.rename_episodes {
                report.files_renamed =
                    rename_episodes(&request.path, &request.title, request.season_hint);
            }
        } else if request.kind == ContentKind::Movies && config.rename_movies {
            match request.year {
                Some(year) => {
                    report.files_renamed = rename_movies(&request.path, &request.title, Some(year));
                }
                None => debug!(title = %request.title, "No year, leaving movie names as-is"),
            }
        }

        report
    }
}

#[async_trait]
impl PostProcessor for LibraryPostProcessor {
    fn name(&self) -> &str {
        "library"
    }

    async fn process_directory(
        &self,
        request: &PostProcessRequest,
    ) -> Result<PostProcessReport, PostProcessError> {
        if !tokio::fs::try_exists(&request.path).await.unwrap_or(false) {
            return Err(PostProcessError::NotFound {
                path: request.path.clone(),
            });
        }

        let config = self.config.clone();
        let owned = request.clone();
        let report = tokio::task::spawn_blocking(move || Self::process_blocking(&config, &owned))
            .await
            .map_err(|e| PostProcessError::TaskFailed(e.to_string()))?;

        info!(
            path = %request.path.display(),
            extracted = report.archives_extracted,
            failed = report.archives_failed,
            renamed = report.files_renamed,
            "Post-processing finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn request(path: PathBuf, kind: ContentKind) -> PostProcessRequest {
        PostProcessRequest {
            path,
            title: "Show".to_string(),
            season_hint: None,
            kind,
            year: None,
        }
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let processor = LibraryPostProcessor::with_defaults();
        let result = processor
            .process_directory(&request(
                PathBuf::from("/nonexistent/plexdl"),
                ContentKind::Series,
            ))
            .await;
        assert!(matches!(result, Err(PostProcessError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_series_episodes_renamed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("show.s02e05.mkv"), b"x").unwrap();

        let processor = LibraryPostProcessor::with_defaults();
        let report = processor
            .process_directory(&request(dir.path().to_path_buf(), ContentKind::Anime))
            .await
            .unwrap();

        assert_eq!(report.files_renamed, 1);
        assert!(dir.path().join("S02E05 - Show.mkv").exists());
    }

    #[tokio::test]
    async fn test_movie_without_year_untouched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("heat.mkv"), b"x").unwrap();

        let processor = LibraryPostProcessor::with_defaults();
        let mut req = request(dir.path().to_path_buf(), ContentKind::Movies);
        req.title = "Heat".to_string();
        let report = processor.process_directory(&req).await.unwrap();

        assert_eq!(report.files_renamed, 0);
        assert!(dir.path().join("heat.mkv").exists());

        req.year = Some(1995);
        let report = processor.process_directory(&req).await.unwrap();
        assert_eq!(report.files_renamed, 1);
        assert!(dir.path().join("Heat (1995).mkv").exists());
    }

    #[tokio::test]
    async fn test_renaming_disabled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("show.s01e01.mkv"), b"x").unwrap();

        let config = PostProcessConfig {
            rename_episodes: false,
            ..PostProcessConfig::default()
        };
        let report = LibraryPostProcessor::new(config)
            .process_directory(&request(dir.path().to_path_buf(), ContentKind::Series))
            .await
            .unwrap();

        assert_eq!(report, PostProcessReport::default());
        assert!(dir.path().join("show.s01e01.mkv").exists());
    }
}
