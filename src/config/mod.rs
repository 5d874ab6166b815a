pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extensions, validate_path, validate_positive_number, validate_range,
    validate_url_template,
};
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use std::time::Duration;

pub const DEFAULT_TRAITS_INPUT: &str = "app/data/trait.json";
pub const DEFAULT_UNITS_INPUT: &str = "app/data/chess.json";
pub const DEFAULT_OUTPUT_DIR: &str = "app/data";
pub const DEFAULT_TRAITS_FILE: &str = "trait-new.json";
pub const DEFAULT_CATALOG_FILE: &str = "units.json";
pub const DEFAULT_IMAGE_DIR: &str = "public/images/units";
pub const DEFAULT_IMAGE_URL_PREFIX: &str = "/images/units";
pub const DEFAULT_ASSET_URL_TEMPLATE: &str =
    "https://game.gtimg.cn/images/lol/act/img/tft/champions/{hero}.png";
pub const DEFAULT_CONCURRENT_DOWNLOADS: usize = 4;
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_PLACEHOLDER_MARKER: &str = "假人";
pub const DEFAULT_SPOT_CHECK_TRAIT: u32 = 298;
pub const DEFAULT_SPOT_CHECK_UNIT: u32 = 23332;

const MAX_REQUEST_TIMEOUT_SECS: u64 = 3_600;
const MAX_RUN_TIMEOUT_SECS: u64 = 86_400;

/// CLI 與 TOML 共用的檢查
pub(crate) fn validate_provider<C: ConfigProvider>(config: &C) -> Result<()> {
    validate_url_template(
        "asset_url_template",
        config.asset_url_template(),
        crate::core::asset_downloader::ART_KEY_PLACEHOLDER,
    )?;

    validate_path("traits_input", &config.traits_input().to_string_lossy())?;
    validate_path("units_input", &config.units_input().to_string_lossy())?;
    validate_path("output_dir", &config.output_dir().to_string_lossy())?;
    validate_path("image_dir", &config.image_dir().to_string_lossy())?;

    let traits_input = config.traits_input().to_string_lossy();
    let units_input = config.units_input().to_string_lossy();
    validate_file_extensions(
        "input",
        &[traits_input.as_ref(), units_input.as_ref()],
        &["json"],
    )?;
    validate_file_extensions(
        "output",
        &[config.traits_output_file(), config.catalog_output_file()],
        &["json"],
    )?;

    validate_positive_number("concurrent_downloads", config.concurrent_downloads(), 1)?;
    validate_range(
        "request_timeout_secs",
        config.request_timeout().as_secs(),
        1,
        MAX_REQUEST_TIMEOUT_SECS,
    )?;
    validate_range(
        "run_timeout_secs",
        config.run_timeout().as_secs(),
        1,
        MAX_RUN_TIMEOUT_SECS,
    )?;

    Ok(())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "tft-catalog")]
#[command(about = "Builds the normalized TFT trait and unit catalog from raw game-data exports")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_TRAITS_INPUT)]
    pub traits_input: PathBuf,

    #[arg(long, default_value = DEFAULT_UNITS_INPUT)]
    pub units_input: PathBuf,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_TRAITS_FILE)]
    pub traits_file: String,

    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    pub catalog_file: String,

    #[arg(long, default_value = DEFAULT_IMAGE_DIR)]
    pub image_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_IMAGE_URL_PREFIX)]
    pub image_url_prefix: String,

    #[arg(long, default_value = DEFAULT_ASSET_URL_TEMPLATE)]
    pub asset_url_template: String,

    #[arg(long, default_value_t = DEFAULT_CONCURRENT_DOWNLOADS)]
    pub concurrent_downloads: usize,

    #[arg(long, default_value_t = DEFAULT_REQUEST_INTERVAL_MS)]
    pub request_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_RUN_TIMEOUT_SECS)]
    pub run_timeout_secs: u64,

    #[arg(long, value_delimiter = ',', default_value = DEFAULT_PLACEHOLDER_MARKER)]
    pub placeholder_markers: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_SPOT_CHECK_TRAIT)]
    pub spot_check_trait: u32,

    #[arg(long, default_value_t = DEFAULT_SPOT_CHECK_UNIT)]
    pub spot_check_unit: u32,

    #[arg(long, help = "Load pipeline settings from a TOML file instead of the flags above")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Load, group and resolve only; nothing is downloaded or written")]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn traits_input(&self) -> &Path {
        &self.traits_input
    }

    fn units_input(&self) -> &Path {
        &self.units_input
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn traits_output_file(&self) -> &str {
        &self.traits_file
    }

    fn catalog_output_file(&self) -> &str {
        &self.catalog_file
    }

    fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    fn image_url_prefix(&self) -> &str {
        &self.image_url_prefix
    }

    fn asset_url_template(&self) -> &str {
        &self.asset_url_template
    }

    fn concurrent_downloads(&self) -> usize {
        self.concurrent_downloads
    }

    fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    fn placeholder_markers(&self) -> &[String] {
        &self.placeholder_markers
    }

    fn spot_check_trait(&self) -> Option<u32> {
        Some(self.spot_check_trait)
    }

    fn spot_check_unit(&self) -> Option<u32> {
        Some(self.spot_check_unit)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self)
    }
}
