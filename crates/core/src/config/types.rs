use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::download::{ContentKind, DownloadToolConfig};
use crate::postprocess::{PermissionsConfig, PostProcessConfig};
use crate::progress::ProgressConfig;
use crate::runner::RunnerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadToolConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub post_process: PostProcessConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
}

impl Config {
    /// Find a library by name (case-insensitive).
    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries
            .iter()
            .find(|lib| lib.name.eq_ignore_ascii_case(name))
    }
}

/// A media library root that downloads are placed under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Display name, also used to select the library from the front-end.
    pub name: String,
    /// What kind of content lives in this library.
    pub kind: ContentKind,
    /// Root directory of the library.
    pub root: PathBuf,
}

impl LibraryConfig {
    pub fn new(name: impl Into<String>, kind: ContentKind, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            root: root.into(),
        }
    }
}
