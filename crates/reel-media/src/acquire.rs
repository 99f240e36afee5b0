//! Source acquisition: turn caller references into local files.
//!
//! Supported references:
//! - `http://` / `https://` URLs, streamed to `in_<uuid>.<ext>`
//! - `s3://` / `gs://` URIs, returned unchanged (pre-mounted mirror)
//! - `file://` URLs and plain local paths, copied to `in_<uuid><suffix>`
//! - any other URL scheme is rejected as unsupported

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Video file extensions picked up from directory sources.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];

/// Default HTTP download timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// How a reference string is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SourceKind {
    Http(Url),
    ObjectStore,
    Local(PathBuf),
    Unsupported(String),
}

fn classify(reference: &str) -> SourceKind {
    if let Ok(url) = Url::parse(reference) {
        match url.scheme() {
            "http" | "https" => return SourceKind::Http(url),
            "s3" | "gs" => return SourceKind::ObjectStore,
            "file" => {
                if let Ok(path) = url.to_file_path() {
                    return SourceKind::Local(path);
                }
            }
            // Single letters are Windows drive prefixes
            scheme if scheme.len() > 1 => return SourceKind::Unsupported(scheme.to_string()),
            _ => {}
        }
    }
    let stripped = reference.strip_prefix("file://").unwrap_or(reference);
    SourceKind::Local(PathBuf::from(stripped))
}

/// Downloads and copies source media into a job's working directory.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TIMEOUT)
    }
}

impl MediaFetcher {
    /// Create a fetcher whose HTTP requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Resolve one reference to a local path inside `work_dir`.
    pub async fn resolve_source(&self, reference: &str, work_dir: &Path) -> MediaResult<PathBuf> {
        let reference = reference.trim();
        match classify(reference) {
            SourceKind::Http(url) => self.download(&url, work_dir).await,
            SourceKind::ObjectStore => {
                debug!(reference, "Object store reference passed through unchanged");
                Ok(PathBuf::from(reference))
            }
            SourceKind::Local(path) => copy_local(&path, work_dir).await,
            SourceKind::Unsupported(scheme) => Err(MediaError::UnsupportedSource(format!(
                "{} ({}:// is not supported)",
                reference, scheme
            ))),
        }
    }

    /// Resolve references in order. The first failure aborts.
    pub async fn resolve_sources(
        &self,
        references: &[String],
        work_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        let mut resolved = Vec::with_capacity(references.len());
        for reference in references {
            resolved.push(self.resolve_source(reference, work_dir).await?);
        }
        Ok(resolved)
    }

    async fn download(&self, url: &Url, work_dir: &Path) -> MediaResult<PathBuf> {
        fs::create_dir_all(work_dir).await?;
        let dest = work_dir.join(format!("in_{}.{}", Uuid::new_v4().simple(), url_extension(url)));

        info!(url = %url, dest = %dest.display(), "Downloading source");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!("{}: HTTP {}", url, status)));
        }

        let partial = dest.with_extension("part");
        let mut file = fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&partial).await;
                    return Err(MediaError::download_failed(format!("{}: {}", url, e)));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        fs::rename(&partial, &dest).await?;
        debug!(bytes = written, dest = %dest.display(), "Download complete");
        Ok(dest)
    }
}

async fn copy_local(path: &Path, work_dir: &Path) -> MediaResult<PathBuf> {
    if !fs::try_exists(path).await.unwrap_or(false) || !path.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    fs::create_dir_all(work_dir).await?;
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".mp4".to_string());
    let dest = work_dir.join(format!("in_{}{}", Uuid::new_v4().simple(), suffix));
    fs::copy(path, &dest).await?;
    Ok(dest)
}

/// Extension taken from the URL path when it names a known media type.
fn url_extension(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| {
            VIDEO_EXTENSIONS.contains(&ext.as_str())
                || matches!(ext.as_str(), "mp3" | "m4a" | "aac" | "wav")
        })
        .unwrap_or_else(|| "mp4".to_string())
}

/// Whether a path has one of the [`VIDEO_EXTENSIONS`] (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Video files in `dir`, sorted by file name and truncated to `max_files`.
pub async fn list_directory_videos(
    dir: impl AsRef<Path>,
    max_files: usize,
) -> MediaResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MediaError::FileNotFound(dir.to_path_buf()));
    }

    let mut entries = fs::read_dir(dir).await?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && is_video_file(&path) {
            videos.push(path);
        }
    }

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    videos.truncate(max_files);
    Ok(videos)
}
