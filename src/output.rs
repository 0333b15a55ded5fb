//! Result types produced by the batch and split operations.

use crate::error::{FetchError, ManifestWarning, PagebindError, RangeError};
use crate::pipeline::manifest::ManifestEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Artifacts ────────────────────────────────────────────────────────────

/// Where a fetched payload lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactData {
    /// Streamed to a file (staging name until the coordinator commits it).
    File(PathBuf),
    /// Held in memory (no artifact directory configured).
    Memory(Vec<u8>),
}

/// A successfully fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Ordinal of the manifest entry it came from.
    pub ordinal: u32,
    /// Lower-case file extension without the dot.
    pub extension: String,
    /// Payload size in bytes.
    pub bytes: u64,
    pub data: ArtifactData,
}

impl Artifact {
    /// An in-memory artifact.
    pub fn from_bytes(ordinal: u32, extension: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            ordinal,
            extension: extension.into(),
            bytes: bytes.len() as u64,
            data: ArtifactData::Memory(bytes),
        }
    }

    /// On-disk location, if the artifact was stored.
    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            ArtifactData::File(p) => Some(p),
            ArtifactData::Memory(_) => None,
        }
    }
}

// ── Per-entry results ────────────────────────────────────────────────────

/// Outcome of fetching one manifest entry.
///
/// Exactly one of payload or error exists, enforced by the `Result`.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub entry: ManifestEntry,
    pub outcome: Result<Artifact, FetchError>,
}

impl FetchResult {
    pub fn success(entry: ManifestEntry, artifact: Artifact) -> Self {
        Self {
            entry,
            outcome: Ok(artifact),
        }
    }

    pub fn failure(entry: ManifestEntry, error: FetchError) -> Self {
        Self {
            entry,
            outcome: Err(error),
        }
    }
}

/// A successful fetch kept in a [`BatchOutcome`].
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub entry: ManifestEntry,
    pub artifact: Artifact,
}

/// A failed fetch kept in a [`BatchOutcome`]. The payload never existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntry {
    pub ordinal: u32,
    pub source: String,
    pub error: FetchError,
}

/// Everything the coordinator learned from one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successful fetches, strictly ascending by ordinal, one per ordinal.
    pub successes: Vec<FetchedArtifact>,
    /// Failed fetches in ordinal order.
    pub failures: Vec<FailedEntry>,
    /// Every fetch that succeeded, including ones superseded by a duplicate.
    pub success_count: usize,
    pub failure_count: usize,
    /// Successful fetches dropped because a later entry shared their ordinal.
    pub superseded: usize,
}

impl BatchOutcome {
    /// Number of entries dispatched.
    pub fn attempted(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// True when assembly has nothing to work with.
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty()
    }

    /// Artifacts in assembly order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.successes.iter().map(|s| s.artifact.clone()).collect()
    }

    pub fn ordinals(&self) -> Vec<u32> {
        self.successes.iter().map(|s| s.entry.ordinal).collect()
    }
}

// ── Reports ──────────────────────────────────────────────────────────────

/// Summary of a written PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    /// Written file, or `None` when assembled in memory.
    pub path: Option<PathBuf>,
    pub pages: usize,
    pub bytes: u64,
    /// Pages whose image bytes were embedded verbatim.
    pub passthrough_pages: usize,
    /// Pages that had to be decoded and re-compressed.
    pub reencoded_pages: usize,
}

/// A stored artifact as listed in a [`BatchReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub ordinal: u32,
    pub source: String,
    pub bytes: u64,
    pub path: Option<PathBuf>,
}

/// Result of a download-then-merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Well-formed manifest entries (malformed lines are not counted).
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub superseded: usize,
    /// Skipped manifest lines.
    pub warnings: Vec<ManifestWarning>,
    pub failures: Vec<FailedEntry>,
    pub artifacts: Vec<StoredArtifact>,
    /// Present when a document was assembled.
    pub assembly: Option<AssemblyStats>,
    /// True when no entry succeeded and assembly was skipped.
    pub nothing_to_assemble: bool,
    pub duration_ms: u64,
}

/// One range written by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRange {
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub pages: usize,
    pub path: PathBuf,
}

/// One range the extractor refused or failed to write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRange {
    pub label: String,
    pub error: RangeError,
}

/// Result of extracting ranges from one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub source: PathBuf,
    pub total_pages: usize,
    pub extracted: Vec<ExtractedRange>,
    pub rejected: Vec<RejectedRange>,
}

// ── Core boundary ────────────────────────────────────────────────────────

/// Transport-neutral result: `{"success": bool, "data" | "error"}`.
///
/// An HTTP layer maps `success` to a status code; nothing here depends on one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failing stage for fatal errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl<T> From<Result<T, PagebindError>> for CoreResult<T> {
    fn from(result: Result<T, PagebindError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                stage: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                stage: Some(e.stage().to_string()),
            },
        }
    }
}
