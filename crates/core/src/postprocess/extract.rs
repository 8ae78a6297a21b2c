//! Archive discovery and extraction.
//!
//! Zip archives are extracted in-process. RAR sets (`.rar`, `.partN.rar`,
//! `.r00`, `.001`) go through the external `unrar` tool, starting from the
//! first volume only. Archives are extracted next to themselves.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::error::PostProcessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

/// An archive set, identified by its first volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub kind: ArchiveKind,
    /// Every file belonging to the set, first volume included.
    pub volumes: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub extracted: usize,
    pub failed: usize,
}

/// Find archive sets under `root`, one entry per set.
pub fn find_archives(root: &Path) -> Vec<Archive> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let mut archives: Vec<Archive> = files
        .iter()
        .filter_map(|path| {
            let kind = first_volume_kind(&lower_name(path)?)?;
            let volumes = match kind {
                ArchiveKind::Zip => vec![path.clone()],
                ArchiveKind::Rar => volume_set(path, &files),
            };
            Some(Archive {
                path: path.clone(),
                kind,
                volumes,
            })
        })
        .collect();
    archives.sort_by(|a, b| a.path.cmp(&b.path));
    archives
}

/// Extract every archive under `root`. Failures are logged and counted.
pub fn extract_archives(root: &Path, unrar: &Path, remove_after: bool) -> ExtractReport {
    let mut report = ExtractReport::default();
    for archive in find_archives(root) {
        let dest = archive.path.parent().unwrap_or(root);
        let result = match archive.kind {
            ArchiveKind::Zip => extract_zip(&archive.path, dest),
            ArchiveKind::Rar => extract_rar(unrar, &archive.path, dest),
        };
        match result {
            Ok(()) => {
                info!(archive = %archive.path.display(), "Extracted archive");
                report.extracted += 1;
                if remove_after {
                    for volume in &archive.volumes {
                        if let Err(e) = std::fs::remove_file(volume) {
                            warn!(file = %volume.display(), error = %e, "Could not remove archive volume");
                        }
                    }
                }
            }
            Err(e) => {
                error!(archive = %archive.path.display(), error = %e, "Error extracting archive");
                report.failed += 1;
            }
        }
    }
    report
}

fn extract_zip(path: &Path, dest: &Path) -> Result<(), PostProcessError> {
    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| PostProcessError::extraction(path, e.to_string()))?;
    archive
        .extract(dest)
        .map_err(|e| PostProcessError::extraction(path, e.to_string()))
}

fn extract_rar(unrar: &Path, path: &Path, dest: &Path) -> Result<(), PostProcessError> {
    // unrar treats a destination ending in a separator as a directory
    let mut dest_arg = dest.as_os_str().to_os_string();
    dest_arg.push(std::path::MAIN_SEPARATOR_STR);

    let status = Command::new(unrar)
        .arg("x")
        .arg("-o+")
        .arg(path)
        .arg(&dest_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| PostProcessError::tool_failed(unrar.display().to_string(), e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(PostProcessError::tool_failed(
            unrar.display().to_string(),
            format!("exit status {:?} for {}", status.code(), path.display()),
        ))
    }
}

fn lower_name(path: &Path) -> Option<String> {
    Some(path.file_name()?.to_str()?.to_ascii_lowercase())
}

/// Kind of archive if `name` is the first volume of a set.
fn first_volume_kind(name: &str) -> Option<ArchiveKind> {
    if name.ends_with(".zip") {
        return Some(ArchiveKind::Zip);
    }
    if let Some(part) = part_number(name) {
        return (part == 1).then_some(ArchiveKind::Rar);
    }
    if name.ends_with(".rar") || name.ends_with(".001") {
        return Some(ArchiveKind::Rar);
    }
    // .r00, .r01, ... are volumes of the matching .rar
    None
}

/// `n` for names like `movie.part03.rar`.
fn part_number(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".rar")?;
    let idx = stem.rfind(".part")?;
    stem[idx + 5..].parse().ok()
}

/// Files in the same directory that belong to the set starting at `first`.
fn volume_set(first: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    let Some(first_name) = lower_name(first) else {
        return vec![first.to_path_buf()];
    };
    let dir = first.parent();
    let mut volumes: Vec<PathBuf> = files
        .iter()
        .filter(|f| f.parent() == dir)
        .filter(|f| {
            lower_name(f).is_some_and(|name| name == first_name || is_volume_of(&first_name, &name))
        })
        .cloned()
        .collect();
    volumes.sort();
    volumes
}

fn is_volume_of(first: &str, candidate: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if part_number(first).is_some() {
        let prefix = match first.rfind(".part") {
            Some(idx) => &first[..idx + 5],
            None => return false,
        };
        return candidate
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(".rar"))
            .is_some_and(all_digits);
    }
    if let Some(stem) = first.strip_suffix(".rar") {
        return candidate
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix(".r"))
            .is_some_and(|n| n.len() == 2 && all_digits(n));
    }
    if let Some(stem) = first.strip_suffix(".001") {
        return candidate
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|n| n.len() == 3 && all_digits(n));
    }
    false
}
