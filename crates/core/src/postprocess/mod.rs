//! Post-download processing of a destination directory.
//!
//! Two collaborators run after a successful download:
//! - [`PostProcessor`]: archive extraction and library-style renaming,
//!   run once per content item (gated by the queue's content ledger)
//! - [`PermissionNormalizer`]: ownership and mode fixes, run after every
//!   successful download

mod config;
mod error;
mod extract;
mod library;
mod naming;
mod permissions;
mod traits;

pub use config::{PermissionsConfig, PostProcessConfig};
pub use error::{PermissionError, PostProcessError};
pub use extract::{extract_archives, find_archives, Archive, ArchiveKind, ExtractReport};
pub use library::LibraryPostProcessor;
pub use naming::{
    episode_file_name, is_video, movie_base_name, parse_season_episode, rename_episodes,
    rename_movies, safe_title, VIDEO_EXTENSIONS,
};
pub use permissions::FsPermissionNormalizer;
pub use traits::{
    PermissionNormalizer, PermissionReport, PostProcessReport, PostProcessRequest, PostProcessor,
};
