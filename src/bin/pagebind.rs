//! CLI binary for edgequake-pagebind.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `BatchConfig` / `SplitConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pagebind::{
    assemble_directory, extract_ranges, fetch_and_assemble, parse_range_list, BatchConfig,
    BatchProgressCallback, BatchReport, CoreResult, PageRange, PagebindError, ProgressCallback,
    SplitConfig, SplitReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per fetched entry. Entries complete
/// out of order, so per-entry start times are keyed by ordinal.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<u32, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, ordinal: u32) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&ordinal)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_entries: usize) {
        self.bar.set_length(total_entries as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Fetching {total_entries} images…"))
        ));
    }

    fn on_fetch_start(&self, ordinal: u32, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(ordinal, Instant::now());
        self.bar.set_message(format!("#{ordinal}"));
    }

    fn on_fetch_complete(&self, ordinal: u32, _total: usize, bytes: u64) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} #{:<4}  {:<10}  {}",
            green("✓"),
            ordinal,
            dim(&human_bytes(bytes)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_fetch_error(&self, ordinal: u32, _total: usize, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} #{:<4}  {}  {}",
            red("✗"),
            ordinal,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        let total = succeeded + failed;
        if failed == 0 {
            eprintln!("{} {} images fetched", green("✔"), bold(&succeeded.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images fetched  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

fn human_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1 << 20 => format!("{:.1} MB", b as f64 / (1u64 << 20) as f64),
        b if b >= 1 << 10 => format!("{:.1} KB", b as f64 / (1u64 << 10) as f64),
        b => format!("{b} B"),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Download every image in a manifest and bind them into one PDF
  pagebind fetch manifest.txt -o gallery.pdf

  # Same, with more parallel downloads and a custom image folder
  pagebind fetch manifest.txt -o gallery.pdf --concurrency 8 --images-dir pages/

  # Re-bind images already on disk (image_001.png, image_002.jpg, …)
  pagebind assemble downloaded_images/ -o gallery.pdf

  # Split a book into chapters
  pagebind split book.pdf --range intro=1-12 --range part-1=13-80 -d chapters/

  # Ranges from a JSON file: [{"label": "intro", "start": 1, "end": 12}, …]
  pagebind split book.pdf --ranges-file ranges.json

MANIFEST FORMAT:
  One entry per line, "<ordinal>. <source>":
    1. https://example.com/scan/p1.jpg
    2. https://example.com/scan/p2.jpg
    3. data:image/png;base64,iVBORw0KGgo...
  Blank lines and lines starting with '#' are ignored. Malformed lines are
  skipped with a warning. Pages are ordered by ordinal, not by line.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         pdfium library file or directory (split only)
  PAGEBIND_CONCURRENCY    Parallel downloads (default 4)
  PAGEBIND_TIMEOUT        Per-download timeout in seconds (default 30)
  PAGEBIND_MAX_SIZE_MB    Largest accepted image in MiB (default 64)
  RUST_LOG                Overrides the log filter
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pagebind",
    version,
    about = "Bind numbered image manifests into one PDF, and split PDFs into page ranges",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print a JSON result object on stdout instead of a summary.
    #[arg(long, global = true, env = "PAGEBIND_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PAGEBIND_NO_PROGRESS")]
    no_progress: bool,

    /// Debug logging.
    #[arg(short, long, global = true, env = "PAGEBIND_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "PAGEBIND_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every manifest entry and bind the images into one PDF.
    Fetch {
        /// Manifest file of "<ordinal>. <source>" lines.
        manifest: PathBuf,

        /// Output PDF.
        #[arg(short, long)]
        output: PathBuf,

        /// Where downloaded images are kept. Default: downloaded_images/
        /// next to the output PDF.
        #[arg(long, env = "PAGEBIND_IMAGES_DIR")]
        images_dir: Option<PathBuf>,

        /// Maximum parallel downloads.
        #[arg(short, long, env = "PAGEBIND_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,

        /// Per-download timeout in seconds.
        #[arg(long, env = "PAGEBIND_TIMEOUT", default_value_t = 30)]
        timeout: u64,

        /// Largest accepted image, in MiB.
        #[arg(long, env = "PAGEBIND_MAX_SIZE_MB", default_value_t = 64)]
        max_size_mb: u64,

        /// Pixels per inch used to size pages.
        #[arg(long, env = "PAGEBIND_DPI", default_value_t = 96,
              value_parser = clap::value_parser!(u32).range(36..=1200))]
        dpi: u32,

        /// Image file name prefix.
        #[arg(long, env = "PAGEBIND_PREFIX", default_value = "image_")]
        prefix: String,
    },

    /// Bind images already stored in a directory into one PDF.
    Assemble {
        /// Directory holding <prefix><ordinal>.<ext> files.
        dir: PathBuf,

        /// Output PDF.
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, env = "PAGEBIND_PREFIX", default_value = "image_")]
        prefix: String,

        #[arg(long, env = "PAGEBIND_DPI", default_value_t = 96,
              value_parser = clap::value_parser!(u32).range(36..=1200))]
        dpi: u32,
    },

    /// Extract labelled page ranges of a PDF into separate PDFs.
    Split {
        /// Source PDF.
        pdf: PathBuf,

        /// JSON array of {"label", "start", "end"} objects.
        #[arg(long, required_unless_present = "range")]
        ranges_file: Option<PathBuf>,

        /// LABEL=START-END (1-indexed, inclusive). Repeatable.
        #[arg(long = "range", value_name = "LABEL=START-END", value_parser = parse_range_arg)]
        range: Vec<PageRange>,

        /// Output directory.
        #[arg(short = 'd', long, env = "PAGEBIND_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Password for encrypted PDFs.
        #[arg(long, env = "PAGEBIND_PASSWORD")]
        password: Option<String>,

        /// pdfium library file or directory.
        #[arg(long)]
        pdfium_lib: Option<PathBuf>,
    },
}

fn parse_range_arg(s: &str) -> Result<PageRange, String> {
    s.parse().map_err(|e: PagebindError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while a batch is running.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && matches!(cli.command, Command::Fetch { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Fetch {
            manifest,
            output,
            images_dir,
            concurrency,
            timeout,
            max_size_mb,
            dpi,
            prefix,
        } => {
            let images_dir = images_dir
                .clone()
                .unwrap_or_else(|| default_images_dir(output));
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };

            let mut builder = BatchConfig::builder()
                .concurrency(*concurrency)
                .fetch_timeout_secs(*timeout)
                .max_artifact_bytes(max_size_mb.saturating_mul(1024 * 1024))
                .page_dpi(*dpi)
                .file_prefix(prefix.clone())
                .artifact_dir(images_dir);
            if let Some(cb) = progress {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;

            let result = fetch_and_assemble(manifest, output, &config).await;
            if cli.json {
                return print_json(result);
            }
            let report = result.context("Download-then-merge failed")?;
            if !cli.quiet {
                print_batch_summary(&report, output, show_progress);
            }
        }

        Command::Assemble {
            dir,
            output,
            prefix,
            dpi,
        } => {
            let config = BatchConfig::builder()
                .file_prefix(prefix.clone())
                .page_dpi(*dpi)
                .build()
                .context("Invalid configuration")?;

            let result = assemble_directory(dir, output, &config).await;
            if cli.json {
                return print_json(result);
            }
            let stats = result.with_context(|| format!("Failed to assemble {}", dir.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} pages  {}  →  {}",
                    green("✔"),
                    stats.pages,
                    dim(&human_bytes(stats.bytes)),
                    bold(&output.display().to_string()),
                );
            }
        }

        Command::Split {
            pdf,
            ranges_file,
            range,
            output_dir,
            password,
            pdfium_lib,
        } => {
            let mut ranges = Vec::new();
            if let Some(path) = ranges_file {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read range list from {:?}", path))?;
                ranges.extend(parse_range_list(&json).context("Invalid range list")?);
            }
            ranges.extend(range.iter().cloned());

            let mut builder = SplitConfig::builder().output_dir(output_dir.clone());
            if let Some(p) = password {
                builder = builder.password(p.clone());
            }
            if let Some(p) = pdfium_lib {
                builder = builder.pdfium_lib_path(p.clone());
            }
            let config = builder.build().context("Invalid configuration")?;

            let result = extract_ranges(pdf, ranges, &config).await;
            if cli.json {
                return print_json(result);
            }
            let report = result.context("Range extraction failed")?;
            if !cli.quiet {
                print_split_summary(&report);
            }
        }
    }

    Ok(())
}

fn default_images_dir(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("downloaded_images")
}

/// Print a `CoreResult` and exit non-zero on fatal errors.
fn print_json<T: Serialize>(result: Result<T, PagebindError>) -> Result<()> {
    let failed = result.is_err();
    let core = CoreResult::from(result);
    println!(
        "{}",
        serde_json::to_string_pretty(&core).context("Failed to serialise result")?
    );
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_batch_summary(report: &BatchReport, output: &Path, show_progress: bool) {
    if !report.warnings.is_empty() {
        eprintln!(
            "{} {} manifest line(s) skipped",
            cyan("⚠"),
            report.warnings.len()
        );
        for w in &report.warnings {
            eprintln!("    {}", dim(&w.to_string()));
        }
    }
    // The progress callback already listed each failure.
    if !show_progress {
        for f in &report.failures {
            eprintln!("  {} #{:<4} {}", red("✗"), f.ordinal, f.error);
        }
    }
    if report.superseded > 0 {
        eprintln!(
            "{} {} duplicate ordinal(s) replaced by a later line",
            cyan("⚠"),
            report.superseded
        );
    }

    match &report.assembly {
        Some(stats) => eprintln!(
            "{}  {}/{} images  {} pages  {}  {}ms  →  {}",
            if report.failed == 0 { green("✔") } else { cyan("⚠") },
            report.succeeded,
            report.attempted,
            stats.pages,
            dim(&human_bytes(stats.bytes)),
            report.duration_ms,
            bold(&output.display().to_string()),
        ),
        None => eprintln!(
            "{}  nothing to assemble: 0/{} images fetched, {} not written",
            red("✘"),
            report.attempted,
            output.display()
        ),
    }
}

fn print_split_summary(report: &SplitReport) {
    eprintln!(
        "{} {}  ({} pages)",
        cyan("◆"),
        bold(&report.source.display().to_string()),
        report.total_pages
    );
    for r in &report.extracted {
        eprintln!(
            "  {} {:<16} pages {:>4}-{:<4} →  {}",
            green("✓"),
            r.label,
            r.start,
            r.end,
            r.path.display()
        );
    }
    for r in &report.rejected {
        eprintln!("  {} {:<16} {}", red("✗"), r.label, red(&r.error.to_string()));
    }
    eprintln!(
        "{}  {}/{} ranges extracted",
        if report.rejected.is_empty() { green("✔") } else { cyan("⚠") },
        report.extracted.len(),
        report.extracted.len() + report.rejected.len()
    );
}
