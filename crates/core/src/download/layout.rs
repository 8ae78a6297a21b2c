//! Library folder layout.

use std::path::{Path, PathBuf};

use crate::postprocess::movie_base_name;

/// `root/Title (Year)`, or `root/Title` without a year.
pub fn content_dir(root: &Path, title: &str, year: Option<u32>) -> PathBuf {
    root.join(movie_base_name(title, year))
}

/// `content_dir/Season NN`
pub fn season_dir(content_dir: &Path, season: u32) -> PathBuf {
    content_dir.join(format!("Season {:02}", season))
}
