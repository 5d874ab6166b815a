use crate::core::asset_downloader::{AssetDownloader, DownloadSettings};
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{DownloadReport, PendingUnit, PersistedCatalog, Trait, Unit};
use crate::domain::raw::{decode_export, RawBatch, RawTraitRecord, RawUnitRecord};
use crate::utils::error::{EtlError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the catalog from local export files and the remote image host.
pub struct CatalogPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    downloader: Arc<AssetDownloader>,
}

impl<S: Storage, C: ConfigProvider> CatalogPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let downloader = AssetDownloader::new(DownloadSettings::from_config(&config))?;
        Ok(Self {
            storage,
            config,
            downloader: Arc::new(downloader),
        })
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn downloader(&self) -> &AssetDownloader {
        &self.downloader
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CatalogPipeline<S, C> {
    async fn load_traits(&self) -> Result<RawBatch<RawTraitRecord>> {
        let path = self.config.traits_input();
        tracing::info!("📖 Reading traits: {}", path.display());
        let bytes = self.storage.read_file(path).await?;
        decode_export(&bytes, path)
    }

    async fn load_units(&self) -> Result<RawBatch<RawUnitRecord>> {
        let path = self.config.units_input();
        tracing::info!("📖 Reading units: {}", path.display());
        let bytes = self.storage.read_file(path).await?;
        decode_export(&bytes, path)
    }

    fn placeholder_markers(&self) -> &[String] {
        self.config.placeholder_markers()
    }

    async fn download_assets(&self, units: Vec<PendingUnit>) -> Result<DownloadReport> {
        tracing::info!(
            "🖼️  Downloading images for {} units into {} (max {} concurrent, {:?} apart)",
            units.len(),
            self.downloader.settings().image_dir.display(),
            self.downloader.settings().max_concurrency,
            self.downloader.settings().request_interval
        );
        Arc::clone(&self.downloader).download_all(units).await
    }

    async fn persist(&self, traits: &[Trait], units: &[Unit]) -> Result<PersistedCatalog> {
        let output_dir = self.config.output_dir();

        // 兩個檔案作為同一批寫入：任一個失敗時都不替換
        let traits_json = serde_json::to_string_pretty(traits)?;
        let units_json = serde_json::to_string_pretty(units)?;

        let traits_bytes = traits_json.len();
        let catalog_bytes = units_json.len();
        let written = self
            .storage
            .write_files(vec![
                (
                    output_dir.join(self.config.traits_output_file()),
                    traits_json.into_bytes(),
                ),
                (
                    output_dir.join(self.config.catalog_output_file()),
                    units_json.into_bytes(),
                ),
            ])
            .await?;
        let [traits_path, catalog_path]: [PathBuf; 2] =
            written.try_into().map_err(|paths: Vec<PathBuf>| EtlError::PersistError {
                path: output_dir.to_path_buf(),
                source: std::io::Error::other(format!(
                    "expected 2 written files, got {}",
                    paths.len()
                )),
            })?;

        tracing::debug!("Catalog written with {} units", units.len());
        Ok(PersistedCatalog {
            traits_path,
            catalog_path,
            traits_bytes,
            catalog_bytes,
        })
    }
}
