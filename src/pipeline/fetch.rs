//! Resource fetching: one manifest entry in, one [`FetchResult`] out.
//!
//! The fetcher never returns an error to its caller. Non-2xx responses,
//! timeouts, broken connections and unreadable files all become a
//! [`FetchError`] inside the result, so one dead link cannot sink a batch.
//!
//! Payloads are streamed chunk by chunk into their destination: a staging
//! file in the artifact directory, or a `Vec<u8>` when the batch runs in
//! memory. Either way a payload may not grow past `max_artifact_bytes`. Sources may be HTTP(S) URLs, base64 `data:` URIs or local files
//! (`file://` URIs or bare paths).

use crate::config::BatchConfig;
use crate::error::{FetchError, PagebindError};
use crate::output::{Artifact, ArtifactData, FetchResult};
use crate::pipeline::manifest::ManifestEntry;
use crate::pipeline::store::{artifact_file_name, staging_file_name};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Read buffer size for local sources.
const CHUNK_SIZE: usize = 64 * 1024;

/// Extensions recognised in source paths.
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];

/// Something that can turn a manifest entry into a fetch result.
///
/// The coordinator only depends on this trait; [`ResourceFetcher`] is the
/// network-backed implementation.
pub trait Fetch: Send + Sync {
    fn fetch(&self, entry: ManifestEntry) -> impl Future<Output = FetchResult> + Send;
}

/// Where a source string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Http(Url),
    Data { mime: String, payload: Vec<u8> },
    Local(PathBuf),
}

/// Classify a manifest source string.
pub fn classify_source(source: &str) -> Result<SourceKind, FetchError> {
    let invalid = |detail: String| FetchError::InvalidSource {
        source_ref: source.to_string(),
        detail,
    };

    let lower = source.get(..8).unwrap_or(source).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(source)
            .map(SourceKind::Http)
            .map_err(|e| invalid(e.to_string()));
    }
    if lower.starts_with("data:") {
        return parse_data_uri(source).map_err(invalid);
    }
    if lower.starts_with("file://") {
        let url = Url::parse(source).map_err(|e| invalid(e.to_string()))?;
        return url
            .to_file_path()
            .map(SourceKind::Local)
            .map_err(|_| invalid("file URI has no local path".into()));
    }
    if let Some((scheme, _)) = source.split_once("://") {
        return Err(invalid(format!("unsupported scheme '{scheme}'")));
    }
    Ok(SourceKind::Local(PathBuf::from(source)))
}

/// Parse `data:<mime>;base64,<payload>`.
fn parse_data_uri(uri: &str) -> Result<SourceKind, String> {
    let body = &uri[5..];
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| "data URI has no ',' separator".to_string())?;
    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err("only base64 data URIs are supported".into());
    }
    let payload = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("bad base64 payload: {e}"))?;
    Ok(SourceKind::Data { mime, payload })
}

/// Image extension from the last path segment, if recognised.
pub fn extension_from_path(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next()?;
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    KNOWN_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Image extension for a MIME type such as `image/jpeg; charset=binary`.
pub fn extension_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/tiff" => "tif",
        _ => return None,
    };
    Some(ext.to_string())
}

/// Destination for streamed bytes.
enum Sink {
    File { file: tokio::fs::File, path: PathBuf },
    Memory(Vec<u8>),
}

impl Sink {
    async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            Sink::File { file, .. } => file.write_all(chunk).await,
            Sink::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
        }
    }

    async fn finish(self) -> std::io::Result<ArtifactData> {
        match self {
            Sink::File { mut file, path } => {
                file.flush().await?;
                file.sync_all().await?;
                Ok(ArtifactData::File(path))
            }
            Sink::Memory(buf) => Ok(ArtifactData::Memory(buf)),
        }
    }

    async fn abandon(self) {
        if let Sink::File { file, path } = self {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!("Could not remove partial file {}: {}", path.display(), e);
            }
        }
    }
}

/// Production fetcher backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
    artifact_dir: Option<PathBuf>,
    file_prefix: String,
    pad_width: usize,
    default_extension: String,
}

impl ResourceFetcher {
    /// Build a fetcher from the batch configuration.
    pub fn new(config: &BatchConfig) -> Result<Self, PagebindError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PagebindError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
            max_bytes: config.max_artifact_bytes,
            artifact_dir: config.artifact_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            pad_width: config.pad_width,
            default_extension: config.default_extension.clone(),
        })
    }

    /// Final file name this entry will be stored under.
    pub fn final_name(&self, ordinal: u32, ext: &str) -> String {
        artifact_file_name(&self.file_prefix, ordinal, self.pad_width, ext)
    }

    async fn fetch_entry(&self, entry: &ManifestEntry) -> Result<Artifact, FetchError> {
        match classify_source(&entry.source)? {
            SourceKind::Http(url) => self.fetch_http(entry, url).await,
            SourceKind::Data { mime, payload } => {
                let ext = extension_from_mime(&mime).unwrap_or_else(|| self.default_extension.clone());
                if payload.len() as u64 > self.max_bytes {
                    return Err(self.too_large(entry));
                }
                let mut sink = self.open_sink(entry, &ext).await?;
                for chunk in payload.chunks(CHUNK_SIZE) {
                    if let Err(e) = sink.write(chunk).await {
                        sink.abandon().await;
                        return Err(io_error(&entry.source, e));
                    }
                }
                self.finish(entry, sink, ext, payload.len() as u64).await
            }
            SourceKind::Local(path) => self.fetch_local(entry, &path).await,
        }
    }

    async fn fetch_http(&self, entry: &ManifestEntry, url: Url) -> Result<Artifact, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_transport(&entry.source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: entry.source.clone(),
                status: status.as_u16(),
            });
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(entry));
        }

        let ext = extension_from_path(url.path())
            .or_else(|| {
                response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(extension_from_mime)
            })
            .unwrap_or_else(|| self.default_extension.clone());

        let mut sink = self.open_sink(entry, &ext).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    sink.abandon().await;
                    return Err(self.map_transport(&entry.source, e));
                }
            };
            if written + chunk.len() as u64 > self.max_bytes {
                sink.abandon().await;
                return Err(self.too_large(entry));
            }
            if let Err(e) = sink.write(&chunk).await {
                sink.abandon().await;
                return Err(io_error(&entry.source, e));
            }
            written += chunk.len() as u64;
        }

        self.finish(entry, sink, ext, written).await
    }

    async fn fetch_local(&self, entry: &ManifestEntry, path: &Path) -> Result<Artifact, FetchError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| io_error(&entry.source, e))?;
        let ext = extension_from_path(&path.to_string_lossy())
            .unwrap_or_else(|| self.default_extension.clone());

        let mut sink = self.open_sink(entry, &ext).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    sink.abandon().await;
                    return Err(io_error(&entry.source, e));
                }
            };
            if written + n as u64 > self.max_bytes {
                sink.abandon().await;
                return Err(self.too_large(entry));
            }
            if let Err(e) = sink.write(&buf[..n]).await {
                sink.abandon().await;
                return Err(io_error(&entry.source, e));
            }
            written += n as u64;
        }

        self.finish(entry, sink, ext, written).await
    }

    async fn open_sink(&self, entry: &ManifestEntry, ext: &str) -> Result<Sink, FetchError> {
        match &self.artifact_dir {
            Some(dir) => {
                let name = staging_file_name(&self.final_name(entry.ordinal, ext), entry.position);
                let path = dir.join(name);
                let file = tokio::fs::File::create(&path)
                    .await
                    .map_err(|e| io_error(&entry.source, e))?;
                Ok(Sink::File { file, path })
            }
            None => Ok(Sink::Memory(Vec::new())),
        }
    }

    async fn finish(
        &self,
        entry: &ManifestEntry,
        sink: Sink,
        extension: String,
        written: u64,
    ) -> Result<Artifact, FetchError> {
        if written == 0 {
            sink.abandon().await;
            return Err(FetchError::EmptyBody {
                source_ref: entry.source.clone(),
            });
        }
        let data = sink.finish().await.map_err(|e| io_error(&entry.source, e))?;
        debug!("Fetched #{} ({} bytes) from {}", entry.ordinal, written, entry.source);
        Ok(Artifact {
            ordinal: entry.ordinal,
            extension,
            bytes: written,
            data,
        })
    }

    fn too_large(&self, entry: &ManifestEntry) -> FetchError {
        FetchError::TooLarge {
            source_ref: entry.source.clone(),
            limit: self.max_bytes,
        }
    }

    fn map_transport(&self, source: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: source.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport {
                url: source.to_string(),
                detail: e.to_string(),
            }
        }
    }
}

impl Fetch for ResourceFetcher {
    fn fetch(&self, entry: ManifestEntry) -> impl Future<Output = FetchResult> + Send {
        async move {
            match self.fetch_entry(&entry).await {
                Ok(artifact) => FetchResult::success(entry, artifact),
                Err(e) => {
                    warn!("Failed to fetch #{}: {}", entry.ordinal, e);
                    FetchResult::failure(entry, e)
                }
            }
        }
    }
}

fn io_error(source: &str, e: std::io::Error) -> FetchError {
    FetchError::Io {
        source_ref: source.to_string(),
        detail: e.to_string(),
    }
}
