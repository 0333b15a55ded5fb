//! Download-then-merge entry points.
//!
//! [`run_batch`] dispatches every manifest entry to a [`Fetch`]
//! implementation with bounded concurrency, waits for all of them to finish,
//! then restores ordinal order and resolves duplicate ordinals. Completion
//! order never affects the result. [`fetch_and_assemble`] wraps that with
//! manifest loading and PDF assembly.

use crate::config::BatchConfig;
use crate::error::PagebindError;
use crate::output::{
    AssemblyStats, BatchOutcome, BatchReport, FailedEntry, FetchResult, FetchedArtifact,
    StoredArtifact,
};
use crate::pipeline::assemble::assemble;
use crate::pipeline::fetch::{Fetch, ResourceFetcher};
use crate::pipeline::manifest::{load_manifest, Manifest};
use crate::pipeline::store::{
    artifact_file_name, commit_artifact, discard_artifact, remove_stale_artifacts, scan_artifact_dir,
};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fetch every entry of `manifest` and collect the outcome.
///
/// Individual fetch failures are recorded, never returned. The only errors
/// are failing to create the artifact directory or to commit a stored
/// artifact to its final name.
///
/// With an artifact directory, files from earlier runs that this run does
/// not reproduce are deleted: other extensions of a committed ordinal, and
/// every file of an ordinal that failed this time. A later directory scan
/// then sees exactly this run's successes for the ordinals it touched.
pub async fn run_batch<F: Fetch>(
    manifest: &Manifest,
    fetcher: &F,
    config: &BatchConfig,
) -> Result<BatchOutcome, PagebindError> {
    if let Some(dir) = &config.artifact_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PagebindError::ArtifactDir {
                path: dir.clone(),
                source: e,
            })?;
    }

    let total = manifest.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }
    info!(
        "Fetching {} entries (concurrency {})",
        total, config.concurrency
    );

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let (succeeded_ref, failed_ref) = (&succeeded, &failed);

    let mut results: Vec<FetchResult> = stream::iter(manifest.entries.iter().cloned().map(|entry| {
        let cb = config.progress_callback.clone();
        async move {
            let ordinal = entry.ordinal;
            if let Some(ref cb) = cb {
                cb.on_fetch_start(ordinal, total);
            }
            let result = fetcher.fetch(entry).await;
            match &result.outcome {
                Ok(artifact) => {
                    succeeded_ref.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref cb) = cb {
                        cb.on_fetch_complete(ordinal, total, artifact.bytes);
                    }
                }
                Err(e) => {
                    failed_ref.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref cb) = cb {
                        cb.on_fetch_error(ordinal, total, &e.to_string());
                    }
                }
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    // Completion order is arbitrary; assembly order is (ordinal, position).
    results.sort_by_key(|r| (r.entry.ordinal, r.entry.position));

    let mut outcome = BatchOutcome {
        success_count: succeeded.load(Ordering::SeqCst),
        failure_count: failed.load(Ordering::SeqCst),
        ..Default::default()
    };
    let mut superseded = Vec::new();

    for result in results {
        match result.outcome {
            Ok(artifact) => {
                let fetched = FetchedArtifact {
                    entry: result.entry,
                    artifact,
                };
                match outcome.successes.last_mut() {
                    Some(prev) if prev.entry.ordinal == fetched.entry.ordinal => {
                        warn!(
                            "Duplicate ordinal {}: line {} replaces line {}",
                            fetched.entry.ordinal, fetched.entry.line, prev.entry.line
                        );
                        superseded.push(std::mem::replace(prev, fetched));
                    }
                    _ => outcome.successes.push(fetched),
                }
            }
            Err(error) => outcome.failures.push(FailedEntry {
                ordinal: result.entry.ordinal,
                source: result.entry.source,
                error,
            }),
        }
    }

    outcome.superseded = superseded.len();
    for lost in &superseded {
        discard_artifact(&lost.artifact).await;
    }
    if let Some(dir) = &config.artifact_dir {
        let mut keep = HashMap::with_capacity(outcome.successes.len());
        let mut clear: HashSet<u32> = outcome.failures.iter().map(|f| f.ordinal).collect();
        for i in 0..outcome.successes.len() {
            let s = &mut outcome.successes[i];
            let name = artifact_file_name(
                &config.file_prefix,
                s.entry.ordinal,
                config.pad_width,
                &s.artifact.extension,
            );
            if let Err(e) = commit_artifact(&mut s.artifact, dir.join(&name)).await {
                for pending in &outcome.successes[i..] {
                    discard_artifact(&pending.artifact).await;
                }
                return Err(e);
            }
            if s.artifact.path().is_some() {
                keep.insert(s.entry.ordinal, name);
            } else {
                clear.insert(s.entry.ordinal);
            }
        }

        let removed = remove_stale_artifacts(dir, &config.file_prefix, &keep, &clear).await?;
        if removed > 0 {
            info!("Removed {} stale artifacts from {}", removed, dir.display());
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(outcome.success_count, outcome.failure_count);
    }
    info!(
        "Fetched {}/{} entries ({} failed, {} superseded)",
        outcome.success_count,
        total,
        outcome.failure_count,
        outcome.superseded
    );

    Ok(outcome)
}

/// Load a manifest file, fetch every entry and merge the results into `output`.
///
/// # Errors
/// Only fatal conditions are returned: unreadable manifest, unusable artifact
/// directory, or a failed assembly. When no entry succeeds the report has
/// `nothing_to_assemble = true` and no file is written.
pub async fn fetch_and_assemble(
    manifest_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, PagebindError> {
    let manifest = load_manifest(manifest_path.as_ref()).await?;
    fetch_and_assemble_manifest(manifest, output, config).await
}

/// Same as [`fetch_and_assemble`] for a manifest supplied as data.
pub async fn fetch_and_assemble_manifest(
    manifest: Manifest,
    output: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, PagebindError> {
    let started = Instant::now();
    let output = output.as_ref();

    let fetcher = ResourceFetcher::new(config)?;
    let outcome = run_batch(&manifest, &fetcher, config).await?;

    let assembly = if outcome.is_empty() {
        warn!("No entry was fetched successfully; nothing to assemble");
        None
    } else {
        Some(assemble(outcome.artifacts(), output, config.page_dpi).await?)
    };

    let artifacts = outcome
        .successes
        .iter()
        .map(|s| StoredArtifact {
            ordinal: s.entry.ordinal,
            source: s.entry.source.clone(),
            bytes: s.artifact.bytes,
            path: s.artifact.path().map(Path::to_path_buf),
        })
        .collect();

    let report = BatchReport {
        attempted: outcome.attempted(),
        succeeded: outcome.success_count,
        failed: outcome.failure_count,
        superseded: outcome.superseded,
        warnings: manifest.warnings,
        failures: outcome.failures,
        artifacts,
        nothing_to_assemble: assembly.is_none(),
        assembly,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    debug!("Batch finished in {}ms", report.duration_ms);
    Ok(report)
}

/// Synchronous wrapper around [`fetch_and_assemble`].
///
/// Creates a temporary tokio runtime internally.
pub fn fetch_and_assemble_sync(
    manifest_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, PagebindError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PagebindError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(fetch_and_assemble(manifest_path, output, config))
}

/// Merge the artifacts already stored in `dir` into `output`, in ordinal order.
pub async fn assemble_directory(
    dir: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<AssemblyStats, PagebindError> {
    let artifacts = scan_artifact_dir(dir.as_ref(), &config.file_prefix).await?;
    assemble(artifacts, output.as_ref(), config.page_dpi).await
}
