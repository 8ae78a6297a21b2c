//! Library naming: episode and movie file names, filesystem-safe titles.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Extensions treated as video files (lowercase, without the dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "ts", "m4v", "webm", "flv", "wmv", "mpg", "mpeg", "m2ts", "mts",
];

const INVALID_FS_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

static SEASON_EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S?(\d{1,2})[xE](\d{1,3})").unwrap());
static SEASON_EPISODE_ALT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{1,2})E(\d{1,3})").unwrap());
static EPISODE_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)E(\d{1,3})").unwrap());
/// `101` means season 1, episode 1.
static THREE_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d)(\d{2})(?:\D|$)").unwrap());
static TRAILING_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d{4}\)$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Season and episode numbers parsed from a file name.
///
/// Tries `S01E02` / `1x02`, then a bare `E02` (only with a season hint),
/// then the three-digit `102` form.
pub fn parse_season_episode(name: &str, season_hint: Option<u32>) -> Option<(u32, u32)> {
    let caps = SEASON_EPISODE_RE
        .captures(name)
        .or_else(|| SEASON_EPISODE_ALT_RE.captures(name));
    if let Some(caps) = caps {
        return Some((caps[1].parse().ok()?, caps[2].parse().ok()?));
    }
    if let Some(season) = season_hint {
        if let Some(caps) = EPISODE_ONLY_RE.captures(name) {
            return Some((season, caps[1].parse().ok()?));
        }
    }
    let caps = THREE_DIGIT_RE.captures(name)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// `S01E02 - Title.mkv`
pub fn episode_file_name(title: &str, season: u32, episode: u32, ext: &str) -> String {
    format!("S{:02}E{:02} - {}.{}", season, episode, safe_title(title), ext)
}

/// `Title (Year)`, replacing any year already at the end of the title.
pub fn movie_base_name(title: &str, year: Option<u32>) -> String {
    let cleaned = safe_title(title);
    let base = TRAILING_YEAR_RE.replace(&cleaned, "").trim().to_string();
    match year {
        Some(year) if !base.is_empty() => format!("{} ({})", base, year),
        Some(year) => format!("Content ({})", year),
        None if base.is_empty() => "Content".to_string(),
        None => base,
    }
}

/// Make a title safe to use as a file or folder name.
///
/// Invalid characters become spaces, whitespace is collapsed, and leading or
/// trailing spaces and dots are removed. Falls back to `Content`.
pub fn safe_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if INVALID_FS_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let collapsed = WHITESPACE_RE.replace_all(&replaced, " ");
    let cleaned = collapsed.trim_matches(|c: char| c == ' ' || c == '.');
    if cleaned.is_empty() {
        "Content".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lowercase extension if the path is a video file.
pub fn is_video(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Rename every parsable video file under `root` to `SxxEyy - Title.ext`.
/// Returns the number of files renamed.
pub fn rename_episodes(root: &Path, title: &str, season_hint: Option<u32>) -> usize {
    let mut renamed = 0;
    for path in video_files(root) {
        let Some(ext) = is_video(&path) else { continue };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((season, episode)) = parse_season_episode(name, season_hint) else {
            debug!(file = %path.display(), "No season/episode in file name");
            continue;
        };
        let target = path.with_file_name(episode_file_name(title, season, episode, &ext));
        if rename_without_clobber(&path, target) {
            renamed += 1;
        }
    }
    renamed
}

/// Rename every video file under `root` to `Title (Year).ext`.
/// Returns the number of files renamed.
pub fn rename_movies(root: &Path, title: &str, year: Option<u32>) -> usize {
    let base = movie_base_name(title, year);
    let mut renamed = 0;
    for path in video_files(root) {
        let Some(ext) = is_video(&path) else { continue };
        let target = path.with_file_name(format!("{}.{}", base, ext));
        if rename_without_clobber(&path, target) {
            renamed += 1;
        }
    }
    renamed
}

/// Collected up front so renames do not disturb the walk.
fn video_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_video(e.path()).is_some())
        .map(|e| e.into_path())
        .collect()
}

/// Rename `from` to `to`, or to `to-dupN` when `to` is taken.
fn rename_without_clobber(from: &Path, to: PathBuf) -> bool {
    if from == to {
        return false;
    }
    let target = free_name(to);
    match std::fs::rename(from, &target) {
        Ok(()) => {
            info!(from = %from.display(), to = %target.display(), "Renamed");
            true
        }
        Err(e) => {
            debug!(file = %from.display(), error = %e, "Rename failed");
            false
        }
    }
}

fn free_name(target: PathBuf) -> PathBuf {
    if !target.exists() {
        return target;
    }
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = target.with_file_name(format!("{}-dup{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
