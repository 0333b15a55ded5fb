//! Error types for the edgequake-pagebind library.
//!
//! Failures fall into two groups:
//!
//! * [`PagebindError`] — **Fatal**: the output itself cannot be produced
//!   (the manifest file is unreadable, the merged PDF cannot be written, the
//!   source PDF cannot be opened). Returned as `Err(PagebindError)` from the
//!   top-level operations.
//!
//! * Per-item errors — **Non-fatal**: [`ManifestWarning`] for a skipped
//!   manifest line, [`FetchError`] for one failed download and
//!   [`RangeError`] for one rejected page range. They are stored inside the
//!   batch and split reports so callers see exactly which items were dropped
//!   while everything else still completes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pagebind library.
#[derive(Debug, Error)]
pub enum PagebindError {
    // ── Manifest errors ───────────────────────────────────────────────────
    /// The manifest file could not be read at all.
    #[error("Failed to read manifest '{path}': {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The artifact directory could not be created or listed.
    #[error("Artifact directory '{path}' is unusable: {source}")]
    ArtifactDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fetched artifact could not be moved to its final name.
    #[error("Failed to store artifact '{path}': {source}")]
    ArtifactCommit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// Assembly was requested with no artifacts.
    #[error("Nothing to assemble: no artifacts were supplied")]
    NoArtifacts,

    /// An artifact could not be read back from storage.
    #[error("Failed to read artifact {ordinal} from '{path}': {source}")]
    ArtifactRead {
        ordinal: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact's bytes are not an image the assembler can embed.
    #[error("Artifact {ordinal} is not a supported image: {detail}")]
    UnsupportedImage { ordinal: u32, detail: String },

    /// Could not create or write the merged output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The source document for range extraction could not be opened.
    #[error("Failed to open source PDF '{path}': {detail}")]
    SourceOpenFailed { path: PathBuf, detail: String },

    /// The extraction output directory could not be created.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A range list could not be parsed.
    #[error("Invalid range list: {0}")]
    InvalidRangeList(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PagebindError {
    /// Which stage of the pipeline the error aborted.
    pub fn stage(&self) -> &'static str {
        match self {
            PagebindError::ManifestRead { .. } => "manifest",
            PagebindError::ArtifactDir { .. } | PagebindError::ArtifactCommit { .. } => "fetch",
            PagebindError::NoArtifacts
            | PagebindError::ArtifactRead { .. }
            | PagebindError::UnsupportedImage { .. }
            | PagebindError::OutputWriteFailed { .. } => "assembly",
            PagebindError::PdfiumBindingFailed(_) | PagebindError::SourceOpenFailed { .. } => {
                "open"
            }
            PagebindError::OutputDirFailed { .. } | PagebindError::InvalidRangeList(_) => {
                "extraction"
            }
            PagebindError::InvalidConfig(_) => "config",
            PagebindError::Internal(_) => "internal",
        }
    }
}

/// A manifest line that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestWarning {
    /// The line has no `". "` separator.
    #[error("line {line}: missing '. ' separator in {raw:?}")]
    MissingSeparator { line: usize, raw: String },

    /// The ordinal is not a positive integer.
    #[error("line {line}: invalid ordinal {ordinal:?} in {raw:?}")]
    InvalidOrdinal {
        line: usize,
        ordinal: String,
        raw: String,
    },

    /// Nothing follows the separator.
    #[error("line {line}: empty source in {raw:?}")]
    EmptySource { line: usize, raw: String },

    /// The line is not valid UTF-8. `raw` is a lossy rendering.
    #[error("line {line}: not valid UTF-8: {raw:?}")]
    InvalidEncoding { line: usize, raw: String },
}

/// A non-fatal error for a single manifest entry.
///
/// Recorded in [`crate::output::FetchResult`]; the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// The request did not finish within the per-fetch timeout.
    #[error("timed out after {secs}s fetching '{url}'")]
    Timeout { url: String, secs: u64 },

    /// Connection, TLS or mid-body transport failure.
    #[error("transport error fetching '{url}': {detail}")]
    Transport { url: String, detail: String },

    /// The payload is larger than the configured cap.
    #[error("payload from '{source_ref}' exceeds the {limit}-byte limit")]
    TooLarge { source_ref: String, limit: u64 },

    /// The response or file held zero bytes.
    #[error("empty payload from '{source_ref}'")]
    EmptyBody { source_ref: String },

    /// The source string is not a URL, data URI or readable path.
    #[error("invalid source '{source_ref}': {detail}")]
    InvalidSource { source_ref: String, detail: String },

    /// Local read/write failure while staging the artifact.
    #[error("I/O error for '{source_ref}': {detail}")]
    Io { source_ref: String, detail: String },
}

/// Why a page range was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeError {
    /// `start` is 0; pages are 1-indexed.
    #[error("range '{label}': start page {start} is below 1 (document has {total} pages)")]
    StartBelowOne {
        label: String,
        start: usize,
        total: usize,
    },

    /// `start` lies past the last page.
    #[error("range '{label}': start page {start} exceeds total {total} pages")]
    StartBeyondDocument {
        label: String,
        start: usize,
        total: usize,
    },

    /// `end` is before `start`.
    #[error("range '{label}': end page {end} is before start page {start} (document has {total} pages)")]
    EndBeforeStart {
        label: String,
        start: usize,
        end: usize,
        total: usize,
    },

    /// `end` lies past the last page.
    #[error("range '{label}': requested end {end} exceeds total {total} pages")]
    EndBeyondDocument {
        label: String,
        end: usize,
        total: usize,
    },

    /// The label yields no usable file name.
    #[error("range '{label}': label is not a usable file name")]
    InvalidLabel { label: String },

    /// pdfium failed to copy or save the range.
    #[error("range '{label}': failed to write '{path}': {detail}")]
    WriteFailed {
        label: String,
        path: PathBuf,
        detail: String,
    },
}
