use crate::core::etl::PipelineStage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Input file not found: {}", path.display())]
    InputMissing { path: PathBuf },

    #[error("Malformed input {}: {message}", path.display())]
    MalformedInput { path: PathBuf, message: String },

    #[error("Parse error in {record}: field '{field}' has invalid value {value}")]
    ParseError {
        record: String,
        field: String,
        value: String,
    },

    #[error("Failed to persist {}: {source}", path.display())]
    PersistError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run timed out after {limit:?} during {stage}")]
    Timeout { stage: PipelineStage, limit: Duration },

    #[error("HTTP client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 單筆記錄層級，不影響整體執行
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Record,
    Network,
    Storage,
    Configuration,
    Runtime,
}

impl EtlError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ParseError { .. } => ErrorSeverity::Low,
            EtlError::Timeout { .. } | EtlError::ApiError(_) => ErrorSeverity::Medium,
            EtlError::InputMissing { .. }
            | EtlError::MalformedInput { .. }
            | EtlError::SerializationError(_)
            | EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            EtlError::PersistError { .. } | EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::InputMissing { .. } | EtlError::MalformedInput { .. } => ErrorCategory::Input,
            EtlError::ParseError { .. } | EtlError::SerializationError(_) => ErrorCategory::Record,
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::PersistError { .. } | EtlError::IoError(_) => ErrorCategory::Storage,
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            EtlError::Timeout { .. } => ErrorCategory::Runtime,
        }
    }

    /// 面向使用者的錯誤訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::InputMissing { path } => {
                format!("找不到輸入檔案: {}", path.display())
            }
            EtlError::MalformedInput { path, .. } => {
                format!("輸入檔案格式錯誤: {}", path.display())
            }
            EtlError::PersistError { path, .. } => {
                format!("無法寫入輸出檔案: {}", path.display())
            }
            EtlError::Timeout { stage, limit } => {
                format!("執行逾時 ({:?})，停在階段 {}", limit, stage)
            }
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                format!("設定錯誤: {}", self)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check the input paths and that the export is a JSON object",
            ErrorCategory::Record => "Inspect the offending record in the raw export",
            ErrorCategory::Network => "Check connectivity to the asset host and rerun; cached images are kept",
            ErrorCategory::Storage => "Check that the output directory exists and is writable",
            ErrorCategory::Configuration => "Fix the configuration value or TOML file and rerun",
            ErrorCategory::Runtime => "Increase --run-timeout-secs or rerun to resume from the image cache",
        }
    }

    /// 0 保留給成功，任何傳到 main 的錯誤都是致命錯誤
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
