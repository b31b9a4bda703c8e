use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Price request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TIFF decoding error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Unsupported raster {path}: {reason}")]
    UnsupportedRaster { path: String, reason: String },

    #[error("Need at least two dated scenes to compare, found {found}")]
    InsufficientScenes { found: usize },

    #[error("Price source returned status {status}: {url}")]
    PriceSourceStatus { url: String, status: u16 },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Processing,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 依嚴重程度決定程序退出碼
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl InferenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::TiffError(_)
            | Self::UnsupportedRaster { .. }
            | Self::InsufficientScenes { .. }
            | Self::CsvError(_) => ErrorCategory::Input,
            Self::ApiError(_) | Self::PriceSourceStatus { .. } => ErrorCategory::Network,
            Self::ZipError(_) | Self::ImageError(_) | Self::SerializationError(_) => {
                ErrorCategory::Output
            }
            Self::IoError(_) | Self::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 場景不足不是故障，只是沒有可比較的資料
            Self::InsufficientScenes { .. } => ErrorSeverity::Low,
            Self::ApiError(_) | Self::PriceSourceStatus { .. } => ErrorSeverity::Medium,
            Self::IoError(_) | Self::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command line flags or TOML file against the documented options"
            }
            ErrorCategory::Input => match self {
                Self::InsufficientScenes { .. } => {
                    "Add at least two GeoTIFF scenes with distinct dates to the data directory"
                }
                _ => "Make sure the scenes are single-directory, chunky GeoTIFF files",
            },
            ErrorCategory::Network => "Check the price source URL and retry later",
            ErrorCategory::Output => "Make sure the output directory is writable",
            ErrorCategory::Processing => "Re-run with --verbose for more detail",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InsufficientScenes { found } => {
                format!("Found {} usable scene(s); need at least two to compare", found)
            }
            Self::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;
