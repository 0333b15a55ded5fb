//! # edgequake-pagebind
//!
//! Bind numbered image manifests into a single PDF, and split PDFs into
//! labelled page ranges.
//!
//! ## Two operations
//!
//! **Download-then-merge.** A manifest lists `"<ordinal>. <source>"` lines.
//! Every source is fetched concurrently (HTTP, `data:` URI or local file),
//! failures are recorded without stopping the batch, and the successful
//! images are bound into one PDF in ordinal order, one page per image.
//!
//! **Range extraction.** A source PDF plus a list of
//! `(label, start, end)` ranges (1-indexed, inclusive) produces one PDF per
//! valid range. An out-of-bounds range is rejected on its own and the rest
//! still run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! manifest.txt
//!  │
//!  ├─ 1. Manifest  parse lines, skip and warn on malformed ones
//!  ├─ 2. Fetch     bounded-concurrency downloads, streamed to staging files
//!  ├─ 3. Order     sort by ordinal, resolve duplicates, commit file names
//!  └─ 4. Assemble  one page per image, JPEG/PNG bytes embedded verbatim
//!
//! source.pdf + ranges ──▶ validate ──▶ copy pages via pdfium ──▶ <label>.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pagebind::{fetch_and_assemble, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .artifact_dir("downloaded_images")
//!         .concurrency(8)
//!         .build()?;
//!     let report = fetch_and_assemble("manifest.txt", "gallery.pdf", &config).await?;
//!     eprintln!("{}/{} images bound", report.succeeded, report.attempted);
//!     Ok(())
//! }
//! ```
//!
//! ```rust,no_run
//! use edgequake_pagebind::{extract_ranges, PageRange, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SplitConfig::builder().output_dir("chapters").build()?;
//!     let ranges = vec![PageRange::new("intro", 1, 12), PageRange::new("part-1", 13, 80)];
//!     let report = extract_ranges("book.pdf".as_ref(), ranges, &config).await?;
//!     for r in &report.rejected {
//!         eprintln!("skipped {}: {}", r.label, r.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagebind` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Range extraction needs a pdfium shared library at runtime. It is looked up
//! via [`SplitConfig::pdfium_lib_path`], then `PDFIUM_LIB_PATH`, then the
//! system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{assemble_directory, fetch_and_assemble, fetch_and_assemble_manifest, fetch_and_assemble_sync, run_batch};
pub use config::{parse_range_list, BatchConfig, BatchConfigBuilder, PageRange, SplitConfig, SplitConfigBuilder};
pub use error::{FetchError, ManifestWarning, PagebindError, RangeError};
pub use output::{
    Artifact, AssemblyStats, BatchOutcome, BatchReport, CoreResult, ExtractedRange, FailedEntry,
    FetchResult, RejectedRange, SplitReport,
};
pub use pipeline::assemble::{assemble, assemble_to_bytes};
pub use pipeline::fetch::{Fetch, ResourceFetcher};
pub use pipeline::manifest::{load_manifest, parse_manifest, parse_manifest_bytes, Manifest, ManifestEntry};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use split::{extract_ranges, extract_with, PageSource};
