//! pdfium binding and the read-only source document used for range extraction.
//!
//! All calls here block. Callers run them inside `spawn_blocking`.

use crate::config::PageRange;
use crate::error::{PagebindError, RangeError};
use crate::split::PageSource;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or its directory.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium.
///
/// Lookup order: `lib_path`, then `$PDFIUM_LIB_PATH`, then the system
/// library. A path may name the library file itself or the directory
/// holding it.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, PagebindError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let file = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", file.display());
            Pdfium::bind_to_library(&file).map_err(|e| {
                PagebindError::PdfiumBindingFailed(format!("{}: {:?}", file.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| PagebindError::PdfiumBindingFailed(format!("system library: {:?}", e)))?,
    };

    Ok(Pdfium::new(bindings))
}

/// A loaded source PDF. Pages are only ever read from it.
pub struct SourceDocument<'a> {
    pdfium: &'a Pdfium,
    document: PdfDocument<'a>,
    path: PathBuf,
}

impl<'a> SourceDocument<'a> {
    /// Open `path`, optionally decrypting with `password`.
    pub fn open(pdfium: &'a Pdfium, path: &Path, password: Option<&'a str>) -> Result<Self, PagebindError> {
        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let detail = format!("{:?}", e);
            let detail = if detail.to_ascii_lowercase().contains("password") {
                if password.is_some() {
                    "incorrect password".to_string()
                } else {
                    "document is encrypted; a password is required".to_string()
                }
            } else {
                detail
            };
            PagebindError::SourceOpenFailed {
                path: path.to_path_buf(),
                detail,
            }
        })?;

        info!(
            "Opened {} ({} pages)",
            path.display(),
            document.pages().len()
        );
        Ok(Self {
            pdfium,
            document,
            path: path.to_path_buf(),
        })
    }
}

impl PageSource for SourceDocument<'_> {
    fn total_pages(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn write_range(&self, range: &PageRange, dest: &Path) -> Result<(), RangeError> {
        let fail = |detail: String| RangeError::WriteFailed {
            label: range.label.clone(),
            path: dest.to_path_buf(),
            detail,
        };

        let (first, last) = range.zero_based();
        let mut out = self
            .pdfium
            .create_new_pdf()
            .map_err(|e| fail(format!("{:?}", e)))?;
        out.pages_mut()
            .copy_page_range_from_document(
                &self.document,
                first as PdfPageIndex..=last as PdfPageIndex,
                0,
            )
            .map_err(|e| fail(format!("{:?}", e)))?;
        let bytes = out.save_to_bytes().map_err(|e| fail(format!("{:?}", e)))?;

        // Temp file + rename so a failed save never leaves a partial PDF.
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
        tmp.write_all(&bytes).map_err(|e| fail(e.to_string()))?;
        tmp.persist(dest).map_err(|e| fail(e.error.to_string()))?;

        debug!(
            "Wrote pages {}-{} of {} → {}",
            range.start,
            range.end,
            self.path.display(),
            dest.display()
        );
        Ok(())
    }
}
