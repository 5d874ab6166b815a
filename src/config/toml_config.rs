use crate::config::{
    validate_provider, DEFAULT_ASSET_URL_TEMPLATE, DEFAULT_CATALOG_FILE, DEFAULT_CONCURRENT_DOWNLOADS,
    DEFAULT_IMAGE_DIR, DEFAULT_IMAGE_URL_PREFIX, DEFAULT_PLACEHOLDER_MARKER,
    DEFAULT_REQUEST_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RUN_TIMEOUT_SECS,
    DEFAULT_SPOT_CHECK_TRAIT, DEFAULT_SPOT_CHECK_UNIT, DEFAULT_TRAITS_FILE,
};
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub assets: AssetsConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub traits: PathBuf,
    pub units: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_traits_file")]
    pub traits_file: String,
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_image_url_prefix")]
    pub image_url_prefix: String,
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    #[serde(default = "default_placeholder_markers")]
    pub placeholder_markers: Vec<String>,
    #[serde(default = "default_spot_check_trait")]
    pub spot_check_trait: Option<u32>,
    #[serde(default = "default_spot_check_unit")]
    pub spot_check_unit: Option<u32>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            placeholder_markers: default_placeholder_markers(),
            spot_check_trait: default_spot_check_trait(),
            spot_check_unit: default_spot_check_unit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub monitor: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_run_timeout_secs(),
            monitor: false,
        }
    }
}

fn default_traits_file() -> String {
    DEFAULT_TRAITS_FILE.to_string()
}

fn default_catalog_file() -> String {
    DEFAULT_CATALOG_FILE.to_string()
}

fn default_image_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGE_DIR)
}

fn default_image_url_prefix() -> String {
    DEFAULT_IMAGE_URL_PREFIX.to_string()
}

fn default_url_template() -> String {
    DEFAULT_ASSET_URL_TEMPLATE.to_string()
}

fn default_concurrent_downloads() -> usize {
    DEFAULT_CONCURRENT_DOWNLOADS
}

fn default_request_interval_ms() -> u64 {
    DEFAULT_REQUEST_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_placeholder_markers() -> Vec<String> {
    vec![DEFAULT_PLACEHOLDER_MARKER.to_string()]
}

fn default_spot_check_trait() -> Option<u32> {
    Some(DEFAULT_SPOT_CHECK_TRAIT)
}

fn default_spot_check_unit() -> Option<u32> {
    Some(DEFAULT_SPOT_CHECK_UNIT)
}

fn default_run_timeout_secs() -> u64 {
    DEFAULT_RUN_TIMEOUT_SECS
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EtlError::ConfigError {
                message: format!("config file not found: {}", path.display()),
            },
            _ => EtlError::IoError(e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ASSET_HOST})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.run.monitor
    }
}

impl ConfigProvider for TomlConfig {
    fn traits_input(&self) -> &Path {
        &self.input.traits
    }

    fn units_input(&self) -> &Path {
        &self.input.units
    }

    fn output_dir(&self) -> &Path {
        &self.output.dir
    }

    fn traits_output_file(&self) -> &str {
        &self.output.traits_file
    }

    fn catalog_output_file(&self) -> &str {
        &self.output.catalog_file
    }

    fn image_dir(&self) -> &Path {
        &self.assets.image_dir
    }

    fn image_url_prefix(&self) -> &str {
        &self.assets.image_url_prefix
    }

    fn asset_url_template(&self) -> &str {
        &self.assets.url_template
    }

    fn concurrent_downloads(&self) -> usize {
        self.assets.concurrent_downloads
    }

    fn request_interval(&self) -> Duration {
        Duration::from_millis(self.assets.request_interval_ms)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.assets.request_timeout_secs)
    }

    fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_secs)
    }

    fn placeholder_markers(&self) -> &[String] {
        &self.resolve.placeholder_markers
    }

    fn spot_check_trait(&self) -> Option<u32> {
        self.resolve.spot_check_trait
    }

    fn spot_check_unit(&self) -> Option<u32> {
        self.resolve.spot_check_unit
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_toml_config() {
        let toml_content = r#"
[input]
traits = "app/data/trait.json"
units = "app/data/chess.json"

[output]
dir = "app/data"

[assets]
url_template = "https://cdn.example.com/champions/{hero}.png"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.units_input(), Path::new("app/data/chess.json"));
        assert_eq!(config.traits_output_file(), "trait-new.json");
        assert_eq!(config.catalog_output_file(), "units.json");
        assert_eq!(config.concurrent_downloads(), 4);
        assert_eq!(config.request_interval(), Duration::from_secs(1));
        assert_eq!(config.run_timeout(), Duration::from_secs(600));
        assert_eq!(config.placeholder_markers(), &["假人".to_string()]);
        assert_eq!(config.spot_check_unit(), Some(23332));
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[input]
traits = "raw/trait.json"
units = "raw/chess.json"

[output]
dir = "dist"
traits_file = "traits.json"
catalog_file = "catalog.json"

[assets]
image_dir = "dist/img"
image_url_prefix = "/img"
url_template = "https://cdn.example.com/{hero}.webp"
concurrent_downloads = 8
request_interval_ms = 250
request_timeout_secs = 10

[resolve]
placeholder_markers = ["假人", "木桩"]
spot_check_unit = 1

[run]
timeout_secs = 120
monitor = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.catalog_output_file(), "catalog.json");
        assert_eq!(config.concurrent_downloads(), 8);
        assert_eq!(config.request_interval(), Duration::from_millis(250));
        assert_eq!(config.placeholder_markers().len(), 2);
        assert_eq!(config.spot_check_trait(), Some(298));
        assert_eq!(config.spot_check_unit(), Some(1));
        assert_eq!(config.run_timeout(), Duration::from_secs(120));
        assert!(config.monitoring_enabled());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TFT_CATALOG_TEST_ASSET_HOST", "https://assets.test");

        let toml_content = r#"
[input]
traits = "trait.json"
units = "chess.json"

[output]
dir = "out"

[assets]
url_template = "${TFT_CATALOG_TEST_ASSET_HOST}/{hero}.png"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.asset_url_template(), "https://assets.test/{hero}.png");

        std::env::remove_var("TFT_CATALOG_TEST_ASSET_HOST");
    }

    #[test]
    fn test_unset_env_var_is_left_verbatim() {
        let toml_content = r#"
[input]
traits = "trait.json"
units = "chess.json"

[output]
dir = "out"

[assets]
url_template = "${TFT_CATALOG_TEST_NEVER_SET}/{hero}.png"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.asset_url_template(),
            "${TFT_CATALOG_TEST_NEVER_SET}/{hero}.png"
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[input]
traits = "trait.json"
units = "chess.json"

[output]
dir = "out"

[assets]
url_template = "https://cdn.example.com/{hero}.png"
concurrent_downloads = 0
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_missing_section_is_config_error() {
        let result = TomlConfig::from_toml_str("[input]\ntraits = \"trait.json\"\n");
        assert!(matches!(result, Err(EtlError::ConfigError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[input]
traits = "trait.json"
units = "chess.json"

[output]
dir = "file-test"

[assets]
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output_dir(), Path::new("file-test"));
        assert_eq!(
            config.asset_url_template(),
            crate::config::DEFAULT_ASSET_URL_TEMPLATE
        );
    }
}
