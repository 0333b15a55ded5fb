//! Range extraction: one source PDF → one PDF per labelled page range.
//!
//! Every range is validated against the source's page count before anything
//! is written. A rejected range is reported and skipped; the remaining ranges
//! are still extracted. Only failing to bind pdfium, open the source, or
//! create the output directory aborts the whole call.

use crate::config::{PageRange, SplitConfig};
use crate::error::{PagebindError, RangeError};
use crate::output::{ExtractedRange, RejectedRange, SplitReport};
use crate::pipeline::pdfium::{bind_pdfium, SourceDocument};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read-only paginated document that can copy page ranges out.
pub trait PageSource {
    fn total_pages(&self) -> usize;

    /// Copy `range` (already validated) into a new document at `dest`.
    fn write_range(&self, range: &PageRange, dest: &Path) -> Result<(), RangeError>;
}

/// Extract `ranges` from `source_path` into `config.output_dir`.
pub async fn extract_ranges(
    source_path: &Path,
    ranges: Vec<PageRange>,
    config: &SplitConfig,
) -> Result<SplitReport, PagebindError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| PagebindError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    let source_path = source_path.to_path_buf();
    let output_dir = config.output_dir.clone();
    let password = config.password.clone();
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_path.as_deref())?;
        let document = SourceDocument::open(&pdfium, &source_path, password.as_deref())?;
        Ok(extract_with(&document, &source_path, &ranges, &output_dir))
    })
    .await
    .map_err(|e| PagebindError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Run the validate-then-write loop against any [`PageSource`].
pub fn extract_with<S: PageSource + ?Sized>(
    source: &S,
    source_path: &Path,
    ranges: &[PageRange],
    output_dir: &Path,
) -> SplitReport {
    let total = source.total_pages();
    let mut report = SplitReport {
        source: source_path.to_path_buf(),
        total_pages: total,
        extracted: Vec::new(),
        rejected: Vec::new(),
    };
    let mut written: HashSet<PathBuf> = HashSet::new();

    for range in ranges {
        let dest = range
            .validate(total)
            .and_then(|()| range.output_path(output_dir));
        let dest = match dest {
            Ok(d) => d,
            Err(e) => {
                warn!("Rejected {}", e);
                report.rejected.push(RejectedRange {
                    label: range.label.clone(),
                    error: e,
                });
                continue;
            }
        };

        if !written.insert(dest.clone()) {
            warn!(
                "Range '{}' overwrites an earlier range's output {}",
                range.label,
                dest.display()
            );
        }

        match source.write_range(range, &dest) {
            Ok(()) => {
                info!(
                    "Extracted '{}' (pages {}-{}) → {}",
                    range.label,
                    range.start,
                    range.end,
                    dest.display()
                );
                report.extracted.push(ExtractedRange {
                    label: range.label.clone(),
                    start: range.start,
                    end: range.end,
                    pages: range.len(),
                    path: dest,
                });
            }
            Err(e) => {
                warn!("{}", e);
                report.rejected.push(RejectedRange {
                    label: range.label.clone(),
                    error: e,
                });
            }
        }
    }

    report
}
