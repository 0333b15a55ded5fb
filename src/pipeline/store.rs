//! Artifact storage layout.
//!
//! Artifacts are named `<prefix><ordinal zero-padded to ≥ 3 digits>.<ext>`
//! (`image_001.png`, `image_002.jpg`, …) so a plain directory listing sorts
//! in ordinal order. Fetches write to hidden per-entry staging names first;
//! only the coordinator moves an artifact to its final name, once it knows
//! which of several same-ordinal entries won.

use crate::config::MIN_PAD_WIDTH;
use crate::error::PagebindError;
use crate::output::{Artifact, ArtifactData};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, warn};

/// Final file name for an artifact.
pub fn artifact_file_name(prefix: &str, ordinal: u32, pad_width: usize, ext: &str) -> String {
    let width = pad_width.max(MIN_PAD_WIDTH);
    format!("{prefix}{ordinal:0width$}.{ext}")
}

/// Staging file name, unique per manifest position.
pub fn staging_file_name(final_name: &str, position: usize) -> String {
    format!(".{final_name}.{position}.part")
}

/// Move a staged artifact to its final name, replacing any older file.
pub async fn commit_artifact(artifact: &mut Artifact, final_path: PathBuf) -> Result<(), PagebindError> {
    if let ArtifactData::File(staged) = &artifact.data {
        tokio::fs::rename(staged, &final_path)
            .await
            .map_err(|e| PagebindError::ArtifactCommit {
                path: final_path.clone(),
                source: e,
            })?;
        debug!("Stored artifact {} → {}", artifact.ordinal, final_path.display());
        artifact.data = ArtifactData::File(final_path);
    }
    Ok(())
}

/// Remove a staged artifact that will not be used.
pub async fn discard_artifact(artifact: &Artifact) {
    if let ArtifactData::File(staged) = &artifact.data {
        if let Err(e) = tokio::fs::remove_file(staged).await {
            warn!("Could not remove staging file {}: {}", staged.display(), e);
        }
    }
}

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.([A-Za-z0-9]+)$").unwrap());

/// Parse `<prefix><digits>.<ext>` into `(ordinal, ext)`.
pub fn parse_artifact_name(prefix: &str, name: &str) -> Option<(u32, String)> {
    let rest = name.strip_prefix(prefix)?;
    let caps = NAME_RE.captures(rest)?;
    let ordinal = caps[1].parse::<u32>().ok()?;
    Some((ordinal, caps[2].to_ascii_lowercase()))
}

/// Delete files in `dir` left over from earlier runs.
///
/// For an ordinal in `keep`, every stored file other than the named one is
/// removed (an older `image_001.png` next to a fresh `image_001.jpg`). An
/// ordinal in `clear` loses all of its files. Returns the number removed.
pub async fn remove_stale_artifacts(
    dir: &Path,
    prefix: &str,
    keep: &HashMap<u32, String>,
    clear: &HashSet<u32>,
) -> Result<usize, PagebindError> {
    let read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PagebindError::ArtifactDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut removed = 0;
    let mut entries = ReadDirStream::new(read_dir);
    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(|e| PagebindError::ArtifactDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((ordinal, _)) = parse_artifact_name(prefix, &name) else {
            continue;
        };
        let stale = match keep.get(&ordinal) {
            Some(kept) => *kept != name,
            None => clear.contains(&ordinal),
        };
        if !stale {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("Removed stale artifact {}", name);
                removed += 1;
            }
            Err(e) => warn!("Could not remove stale artifact {}: {}", name, e),
        }
    }
    Ok(removed)
}

/// List stored artifacts in `dir`, sorted by ordinal.
///
/// Files that do not follow the naming scheme (including staging files) are
/// ignored. When two files share an ordinal (`image_004.png` and
/// `image_004.jpg`), the one whose name sorts last is kept.
pub async fn scan_artifact_dir(dir: &Path, prefix: &str) -> Result<Vec<Artifact>, PagebindError> {
    let read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PagebindError::ArtifactDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut found: Vec<(u32, String, Artifact)> = Vec::new();
    let mut entries = ReadDirStream::new(read_dir);
    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(|e| PagebindError::ArtifactDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((ordinal, extension)) = parse_artifact_name(prefix, &name) else {
            continue;
        };
        let meta = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        found.push((
            ordinal,
            name,
            Artifact {
                ordinal,
                extension,
                bytes: meta.len(),
                data: ArtifactData::File(entry.path()),
            },
        ));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut artifacts: Vec<Artifact> = Vec::with_capacity(found.len());
    for (_, name, artifact) in found {
        if let Some(last) = artifacts.last_mut() {
            if last.ordinal == artifact.ordinal {
                warn!("Duplicate ordinal {} in {}; using {}", artifact.ordinal, dir.display(), name);
                *last = artifact;
                continue;
            }
        }
        artifacts.push(artifact);
    }

    debug!("Found {} artifacts in {}", artifacts.len(), dir.display());
    Ok(artifacts)
}
