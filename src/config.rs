//! Configuration types for batch fetching and page-range extraction.
//!
//! Download-then-merge runs are controlled through [`BatchConfig`], range
//! extraction through [`SplitConfig`]. Both are built via builders whose
//! setters clamp values into their valid ranges, and whose `build()` rejects
//! combinations that cannot work.
//!
//! Range lists and manifests are always data supplied by the caller, never
//! constants baked into the library.

use crate::error::{PagebindError, RangeError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Minimum number of digits in an artifact file name's ordinal.
pub const MIN_PAD_WIDTH: usize = 3;

/// Default cap on a single fetched payload: 64 MiB.
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for a download-then-merge batch.
///
/// # Example
/// ```rust
/// use edgequake_pagebind::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .concurrency(8)
///     .fetch_timeout_secs(20)
///     .artifact_dir("downloaded_images")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Maximum number of fetches in flight. Default: 4.
    ///
    /// Every fetch is independent, but an unbounded fan-out against one
    /// image host gets throttled or banned quickly. Four keeps a typical
    /// gallery download network-bound without hammering the server.
    pub concurrency: usize,

    /// Per-fetch timeout in seconds, covering connect and body. Default: 30.
    ///
    /// The batch as a whole has no deadline; an entry that exceeds this
    /// limit fails on its own and the rest of the batch continues.
    pub fetch_timeout_secs: u64,

    /// `User-Agent` header sent with every HTTP request.
    pub user_agent: String,

    /// Largest payload a single fetch may produce. Default: 64 MiB.
    ///
    /// Checked against `Content-Length` up front and against the running
    /// byte count while streaming, for files and in-memory payloads alike.
    pub max_artifact_bytes: u64,

    /// Directory fetched artifacts are written to. `None` keeps payloads in
    /// memory. Default: None.
    pub artifact_dir: Option<PathBuf>,

    /// File-name prefix for stored artifacts. Default: `image_`.
    pub file_prefix: String,

    /// Zero-padding width for the ordinal in artifact names. Never below 3.
    pub pad_width: usize,

    /// Extension used when neither the source nor the response reveals one.
    /// Default: `png`.
    pub default_extension: String,

    /// Resolution used to size PDF pages from image pixels. Default: 96.
    ///
    /// A 960 px wide image becomes a 10 inch (720 pt) wide page.
    pub page_dpi: u32,

    /// Optional per-entry progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fetch_timeout_secs: 30,
            user_agent: concat!("edgequake-pagebind/", env!("CARGO_PKG_VERSION")).to_string(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            artifact_dir: None,
            file_prefix: "image_".to_string(),
            pad_width: MIN_PAD_WIDTH,
            default_extension: "png".to_string(),
            page_dpi: 96,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("concurrency", &self.concurrency)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_artifact_bytes", &self.max_artifact_bytes)
            .field("artifact_dir", &self.artifact_dir)
            .field("file_prefix", &self.file_prefix)
            .field("pad_width", &self.pad_width)
            .field("default_extension", &self.default_extension)
            .field("page_dpi", &self.page_dpi)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn max_artifact_bytes(mut self, bytes: u64) -> Self {
        self.config.max_artifact_bytes = bytes.max(1);
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = Some(dir.into());
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn pad_width(mut self, width: usize) -> Self {
        self.config.pad_width = width.max(MIN_PAD_WIDTH);
        self
    }

    pub fn default_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.default_extension = ext.into().trim_start_matches('.').to_ascii_lowercase();
        self
    }

    pub fn page_dpi(mut self, dpi: u32) -> Self {
        self.config.page_dpi = dpi.clamp(36, 1200);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, PagebindError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(PagebindError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if c.file_prefix.contains(['/', '\\']) {
            return Err(PagebindError::InvalidConfig(format!(
                "File prefix must not contain path separators, got {:?}",
                c.file_prefix
            )));
        }
        if c.default_extension.is_empty()
            || !c.default_extension.chars().all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(PagebindError::InvalidConfig(format!(
                "Default extension must be alphanumeric, got {:?}",
                c.default_extension
            )));
        }
        Ok(self.config)
    }
}

/// Configuration for page-range extraction.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Directory the per-range documents are written to. Default: `.`.
    pub output_dir: PathBuf,

    /// User password for encrypted source documents.
    pub password: Option<String>,

    /// Explicit pdfium library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, then to the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            password: None,
            pdfium_lib_path: None,
        }
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SplitConfig, PagebindError> {
        if self.config.output_dir.as_os_str().is_empty() {
            return Err(PagebindError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page ranges ──────────────────────────────────────────────────────────

/// A labelled, 1-indexed, inclusive page range to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// Names the output document.
    pub label: String,
    /// First page (1-indexed).
    pub start: usize,
    /// Last page (1-indexed, inclusive).
    pub end: usize,
}

impl PageRange {
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    /// Check `1 <= start <= end <= total`.
    ///
    /// The first violated bound is reported, checked in the order start,
    /// ordering, end.
    pub fn validate(&self, total: usize) -> Result<(), RangeError> {
        let label = self.label.clone();
        if self.start < 1 {
            return Err(RangeError::StartBelowOne {
                label,
                start: self.start,
                total,
            });
        }
        if self.start > total {
            return Err(RangeError::StartBeyondDocument {
                label,
                start: self.start,
                total,
            });
        }
        if self.end < self.start {
            return Err(RangeError::EndBeforeStart {
                label,
                start: self.start,
                end: self.end,
                total,
            });
        }
        if self.end > total {
            return Err(RangeError::EndBeyondDocument {
                label,
                end: self.end,
                total,
            });
        }
        Ok(())
    }

    /// Number of pages covered. Only meaningful after [`validate`](Self::validate).
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    /// Always false for a validated range; present for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// 0-indexed inclusive bounds, as pdfium addresses pages.
    pub fn zero_based(&self) -> (usize, usize) {
        (self.start - 1, self.end - 1)
    }

    /// Output path for this range inside `dir`.
    pub fn output_path(&self, dir: &Path) -> Result<PathBuf, RangeError> {
        let mut name: String = self
            .label
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c => c,
            })
            .collect();
        if name.is_empty() || name.chars().all(|c| c == '.') {
            return Err(RangeError::InvalidLabel {
                label: self.label.clone(),
            });
        }
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            name.push_str(".pdf");
        }
        Ok(dir.join(name))
    }
}

impl FromStr for PageRange {
    type Err = PagebindError;

    /// Parse `LABEL=START-END`, e.g. `chapter1=1-45`.
    ///
    /// The label may itself contain `=`; the last one separates the pages.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, pages) = s
            .rsplit_once('=')
            .ok_or_else(|| PagebindError::InvalidRangeList(format!("expected LABEL=START-END, got {s:?}")))?;
        let (start, end) = pages
            .split_once('-')
            .ok_or_else(|| PagebindError::InvalidRangeList(format!("expected START-END, got {pages:?}")))?;
        let start = start
            .trim()
            .parse::<usize>()
            .map_err(|e| PagebindError::InvalidRangeList(format!("bad start page {start:?}: {e}")))?;
        let end = end
            .trim()
            .parse::<usize>()
            .map_err(|e| PagebindError::InvalidRangeList(format!("bad end page {end:?}: {e}")))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(PagebindError::InvalidRangeList(format!(
                "empty label in {s:?}"
            )));
        }
        Ok(PageRange::new(label, start, end))
    }
}

/// Parse a JSON array of `{"label", "start", "end"}` objects.
pub fn parse_range_list(json: &str) -> Result<Vec<PageRange>, PagebindError> {
    serde_json::from_str(json).map_err(|e| PagebindError::InvalidRangeList(e.to_string()))
}
