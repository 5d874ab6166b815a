use crate::domain::model::{DownloadReport, PendingUnit, PersistedCatalog, Trait, Unit};
use crate::domain::raw::{RawBatch, RawTraitRecord, RawUnitRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &Path) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    /// Replaces every `(path, data)` pair as one batch. All files are staged
    /// first; nothing is renamed into place unless every stage succeeded.
    fn write_files(
        &self,
        files: Vec<(PathBuf, Vec<u8>)>,
    ) -> impl std::future::Future<Output = Result<Vec<PathBuf>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn traits_input(&self) -> &Path;
    fn units_input(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn traits_output_file(&self) -> &str;
    fn catalog_output_file(&self) -> &str;
    fn image_dir(&self) -> &Path;
    fn image_url_prefix(&self) -> &str;
    fn asset_url_template(&self) -> &str;
    fn concurrent_downloads(&self) -> usize;
    fn request_interval(&self) -> Duration;
    fn request_timeout(&self) -> Duration;
    fn run_timeout(&self) -> Duration;
    fn placeholder_markers(&self) -> &[String];
    fn spot_check_trait(&self) -> Option<u32>;
    fn spot_check_unit(&self) -> Option<u32>;
}

/// One implementation per catalog source; [`crate::EtlEngine`] drives the
/// stages and runs the pure transforms in between.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn load_traits(&self) -> Result<RawBatch<RawTraitRecord>>;
    async fn load_units(&self) -> Result<RawBatch<RawUnitRecord>>;
    fn placeholder_markers(&self) -> &[String];
    async fn download_assets(&self, units: Vec<PendingUnit>) -> Result<DownloadReport>;
    async fn persist(&self, traits: &[Trait], units: &[Unit]) -> Result<PersistedCatalog>;
}
