use crate::core::rate_limiter::RateLimiter;
use crate::core::ConfigProvider;
use crate::domain::model::{DownloadOutcome, DownloadReport, PendingUnit};
use crate::utils::error::{EtlError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

pub const ART_KEY_PLACEHOLDER: &str = "{hero}";
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];
const DEFAULT_EXTENSION: &str = "png";
const PARTIAL_SUFFIX: &str = ".part";

/// 單一 unit 的下載失敗，只會讓該 unit 被排除
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("unit has no hero art key")]
    MissingArtKey,

    #[error("invalid asset URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unexpected status {0}")]
    BadStatus(StatusCode),

    #[error("unexpected content type '{0}'")]
    UnexpectedContentType(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub image_dir: PathBuf,
    pub image_url_prefix: String,
    pub url_template: String,
    pub max_concurrency: usize,
    pub request_interval: Duration,
    pub request_timeout: Duration,
}

impl DownloadSettings {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            image_dir: config.image_dir().to_path_buf(),
            image_url_prefix: config.image_url_prefix().to_string(),
            url_template: config.asset_url_template().to_string(),
            max_concurrency: config.concurrent_downloads(),
            request_interval: config.request_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Picks the cache file extension from the template so the local path is
/// known before anything is fetched.
pub fn image_extension(url_template: &str) -> &'static str {
    let sample = url_template.replace(ART_KEY_PLACEHOLDER, "sample");
    let ext = Url::parse(&sample).ok().and_then(|url| {
        Path::new(url.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    });

    ext.and_then(|ext| IMAGE_EXTENSIONS.iter().copied().find(|known| *known == ext))
        .unwrap_or(DEFAULT_EXTENSION)
}

pub struct AssetDownloader {
    client: Client,
    settings: DownloadSettings,
    limiter: RateLimiter,
    extension: &'static str,
}

impl AssetDownloader {
    pub fn new(settings: DownloadSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("tft-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(settings.request_interval),
            extension: image_extension(&settings.url_template),
            settings,
        })
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    fn file_name(&self, unit_id: u32) -> String {
        format!("{}.{}", unit_id, self.extension)
    }

    /// 本地快取路徑只由 unit id 決定
    pub fn local_path(&self, unit_id: u32) -> PathBuf {
        self.settings.image_dir.join(self.file_name(unit_id))
    }

    /// Path written into the catalog, relative to the static asset root.
    pub fn image_ref(&self, unit_id: u32) -> String {
        format!(
            "{}/{}",
            self.settings.image_url_prefix.trim_end_matches('/'),
            self.file_name(unit_id)
        )
    }

    pub fn asset_url(&self, art_key: &str) -> std::result::Result<Url, DownloadError> {
        let raw = self.settings.url_template.replace(ART_KEY_PLACEHOLDER, art_key);
        Url::parse(&raw).map_err(|e| DownloadError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Non-empty file: cached. Zero-byte file: left by an aborted write,
    /// removed so the unit is fetched again.
    async fn is_cached(&self, path: &Path) -> std::result::Result<bool, DownloadError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(true),
            Ok(meta) if meta.is_file() => {
                tracing::warn!("🧹 Removing zero-byte cache file {}", path.display());
                tokio::fs::remove_file(path).await?;
                Ok(false)
            }
            Ok(_) => Err(DownloadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} exists and is not a file", path.display()),
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(
        &self,
        unit_id: u32,
        url: Url,
        path: PathBuf,
    ) -> std::result::Result<DownloadOutcome, DownloadError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::BadStatus(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(DownloadError::UnexpectedContentType(content_type));
        }

        // 先寫到暫存檔，任何錯誤時 drop 就會刪掉，不留下半個檔案
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}-", unit_id))
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&self.settings.image_dir)?;
        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if written == 0 {
            return Err(DownloadError::EmptyBody);
        }

        // create-if-absent: 同一路徑只會被一個寫入者佔用
        match temp.persist_noclobber(&path) {
            Ok(_) => Ok(DownloadOutcome::fetched(path, written)),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                drop(e.file);
                if self.is_cached(&path).await? {
                    tracing::debug!("Image for unit {} was placed by another writer", unit_id);
                    Ok(DownloadOutcome::cached(path))
                } else {
                    Err(DownloadError::Io(e.error))
                }
            }
            Err(e) => Err(DownloadError::Io(e.error)),
        }
    }

    /// Ensures the image for one unit is on disk, fetching it at most once.
    pub async fn download(
        &self,
        unit_id: u32,
        art_key: Option<&str>,
    ) -> std::result::Result<DownloadOutcome, DownloadError> {
        let path = self.local_path(unit_id);
        if self.is_cached(&path).await? {
            tracing::debug!("Using cached image {}", path.display());
            return Ok(DownloadOutcome::cached(path));
        }

        let key = art_key.ok_or(DownloadError::MissingArtKey)?;
        let url = self.asset_url(key)?;

        self.limiter.acquire().await;
        tracing::debug!("📡 Fetching image for unit {}: {}", unit_id, url);
        self.fetch(unit_id, url, path).await
    }

    /// 被中斷的執行會留下 `.<id>-*.part` 暫存檔，開始下載前先清掉
    async fn sweep_partial_files(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.settings.image_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("⚠️  Cannot scan {}: {}", self.settings.image_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("⚠️  Cannot remove {}: {}", entry.path().display(), e),
            }
        }
        removed
    }

    /// 併發下載所有 unit 的圖片；失敗的 unit 不會出現在結果中
    pub async fn download_all(self: Arc<Self>, units: Vec<PendingUnit>) -> Result<DownloadReport> {
        tokio::fs::create_dir_all(&self.settings.image_dir)
            .await
            .map_err(|source| EtlError::PersistError {
                path: self.settings.image_dir.clone(),
                source,
            })?;

        let removed = self.sweep_partial_files().await;
        if removed > 0 {
            tracing::info!(
                "🧹 Removed {} unfinished downloads from {}",
                removed,
                self.settings.image_dir.display()
            );
        }

        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for pending in units {
            let downloader = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = downloader
                    .download(pending.unit.id, pending.art_key.as_deref())
                    .await;
                (pending.unit, result)
            });
        }

        let mut report = DownloadReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((mut unit, Ok(outcome))) => {
                    if outcome.cached {
                        report.cached += 1;
                    } else {
                        report.fetched += 1;
                        report.bytes_written += outcome.bytes_written;
                    }
                    unit.image = self.image_ref(unit.id);
                    report.units.push(unit);
                }
                Ok((unit, Err(e))) => {
                    tracing::warn!("❌ Unit {} '{}' excluded: {}", unit.id, unit.name, e);
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Download task aborted: {}", e);
                    report.failed += 1;
                }
            }

            let done = report.units.len() + report.failed;
            if done % 50 == 0 || done == total {
                tracing::info!("🖼️  Images: {}/{} processed", done, total);
            }
        }

        Ok(report)
    }
}
