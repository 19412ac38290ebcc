//! Local storage of images and media referenced by converted notes.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use futures_util::stream::{self, StreamExt};
use readitlater_logging::{engine_debug, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::filename::short_hash;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::progress::ProgressSink;
use crate::{FailureKind, Fetcher, JobId, Notice, PipelineError, ResourceKind, Stage};

const HASH_HEX_LEN: usize = 16;
const FALLBACK_EXTENSION: &str = "bin";

enum AssetError {
    Cancelled,
    Failed(String),
}

/// Resolves remote media URLs to vault-relative paths for one conversion.
///
/// Each distinct source URL is downloaded at most once per manager; repeated
/// references get the path recorded the first time. When storage is
/// disabled every URL resolves to itself.
pub struct AssetManager<'a> {
    job_id: JobId,
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
    vault_root: &'a Path,
    relative_dir: Option<String>,
    concurrency: usize,
    resolved: HashMap<String, String>,
}

impl<'a> AssetManager<'a> {
    /// A manager that leaves every reference remote until [`store_in`](Self::store_in) is called.
    pub fn new(
        job_id: JobId,
        fetcher: &'a dyn Fetcher,
        sink: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
        vault_root: &'a Path,
    ) -> Self {
        Self {
            job_id,
            fetcher,
            sink,
            cancel,
            vault_root,
            relative_dir: None,
            concurrency: 1,
            resolved: HashMap::new(),
        }
    }

    /// Store downloads under `relative_dir`, a `/`-separated path inside the vault.
    pub fn store_in(mut self, relative_dir: impl Into<String>) -> Self {
        let dir = relative_dir.into().replace('\\', "/");
        self.relative_dir = Some(dir.trim_matches('/').to_string());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.relative_dir.is_some()
    }

    /// Resolve one source URL. Only cancellation is an error; a failed
    /// download resolves to the original URL.
    pub async fn resolve(&mut self, url: &str) -> Result<String, PipelineError> {
        let mut rewrites = self.resolve_all(&[url.to_string()]).await?;
        Ok(rewrites.remove(url).unwrap_or_else(|| url.to_string()))
    }

    /// Resolve many source URLs with at most `concurrency` downloads in
    /// flight. The returned map covers every URL this manager has seen.
    pub async fn resolve_all(
        &mut self,
        urls: &[String],
    ) -> Result<HashMap<String, String>, PipelineError> {
        let Some(relative_dir) = self.relative_dir.clone() else {
            return Ok(urls.iter().map(|url| (url.clone(), url.clone())).collect());
        };

        let mut queued = HashSet::new();
        let pending: Vec<&String> = urls
            .iter()
            .filter(|url| !self.resolved.contains_key(*url) && queued.insert(*url))
            .collect();
        if !pending.is_empty() {
            self.sink.stage(self.job_id, Stage::DownloadingAssets);
            engine_debug!(
                "job {}: downloading {} asset(s) into {:?}",
                self.job_id,
                pending.len(),
                relative_dir
            );
        }

        let this = &*self;
        let dir = relative_dir.as_str();
        let downloads: Vec<_> = pending
            .into_iter()
            .cloned()
            .map(|url| async move {
                let outcome = this.download(&url, dir).await;
                (url, outcome)
            })
            .collect();
        let outcomes: Vec<(String, Result<String, AssetError>)> = stream::iter(downloads)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut cancelled = false;
        for (url, outcome) in outcomes {
            match outcome {
                Ok(path) => {
                    self.resolved.insert(url, path);
                }
                Err(AssetError::Cancelled) => cancelled = true,
                Err(AssetError::Failed(reason)) => {
                    engine_warn!("job {}: keeping remote asset {}: {}", self.job_id, url, reason);
                    self.sink.notice(
                        self.job_id,
                        Notice::AssetDownloadFailed {
                            url: url.clone(),
                            reason,
                        },
                    );
                    self.resolved.insert(url.clone(), url);
                }
            }
        }
        if cancelled || self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(self.resolved.clone())
    }

    async fn download(&self, url: &str, relative_dir: &str) -> Result<String, AssetError> {
        let hash = short_hash(url, HASH_HEX_LEN);
        let dir = self.vault_root.join(relative_dir);
        let url_extension = extension_from_url(url);

        // Same URL, same name: a file from an earlier note is reused as is.
        if let Some(ext) = &url_extension {
            let name = format!("{hash}.{ext}");
            if dir.join(&name).is_file() {
                return Ok(vault_relative(relative_dir, &name));
            }
        }

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AssetError::Cancelled),
            result = self.fetcher.fetch(url, ResourceKind::Asset) => result.map_err(|err| {
                if err.kind == FailureKind::Cancelled {
                    AssetError::Cancelled
                } else {
                    AssetError::Failed(err.to_string())
                }
            })?,
        };

        let ext = url_extension
            .or_else(|| {
                output
                    .metadata
                    .content_type
                    .as_deref()
                    .and_then(extension_from_content_type)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let name = format!("{hash}.{ext}");

        if self.cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        match AtomicFileWriter::new(dir).write_new_bytes(&name, &output.bytes) {
            Ok(_) | Err(PersistError::AlreadyExists(_)) => Ok(vault_relative(relative_dir, &name)),
            Err(err) => Err(AssetError::Failed(err.to_string())),
        }
    }
}

fn vault_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    ((1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => return None,
    };
    Some(ext)
}
