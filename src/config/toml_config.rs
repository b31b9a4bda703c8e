use crate::core::render::{DEFAULT_DISPLAY_RANGE, DEFAULT_SIGNIFICANCE_RATIO};
use crate::core::volume::DEFAULT_PIXEL_AREA_M2;
use crate::core::ConfigProvider;
use crate::utils::error::{InferenceError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub analysis: AnalysisConfig,
    pub source: SourceConfig,
    pub volume: Option<VolumeConfig>,
    pub render: Option<RenderConfig>,
    pub market: Option<MarketConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub data_dir: String,
    pub concurrent_loads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub pixel_area_m2: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub enabled: Option<bool>,
    pub band: Option<usize>,
    pub display_range: Option<f64>,
    pub significance_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// 本機 CSV 路徑或 http(s) URL
    pub source: String,
    pub ticker: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub bundle: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(InferenceError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| InferenceError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PRICE_URL})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| InferenceError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("analysis.name", &self.analysis.name)?;
        validation::validate_path("source.data_dir", &self.source.data_dir)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        if let Some(loads) = self.source.concurrent_loads {
            validation::validate_positive_number("source.concurrent_loads", loads, 1)?;
        }
        validation::validate_positive_float("volume.pixel_area_m2", self.pixel_area_m2())?;
        validation::validate_positive_float("render.display_range", self.display_range())?;
        validation::validate_float_range(
            "render.significance_ratio",
            self.significance_ratio(),
            0.0,
            1.0,
        )?;

        if let Some(market) = &self.market {
            validation::validate_price_source("market.source", &market.source)?;
            if let Some(ticker) = &market.ticker {
                validation::validate_non_empty_string("market.ticker", ticker)?;
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn data_dir(&self) -> &str {
        &self.source.data_dir
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn pixel_area_m2(&self) -> f64 {
        self.volume
            .as_ref()
            .and_then(|v| v.pixel_area_m2)
            .unwrap_or(DEFAULT_PIXEL_AREA_M2)
    }

    fn significance_ratio(&self) -> f64 {
        self.render
            .as_ref()
            .and_then(|r| r.significance_ratio)
            .unwrap_or(DEFAULT_SIGNIFICANCE_RATIO)
    }

    fn display_range(&self) -> f64 {
        self.render
            .as_ref()
            .and_then(|r| r.display_range)
            .unwrap_or(DEFAULT_DISPLAY_RANGE)
    }

    fn render_band(&self) -> usize {
        self.render.as_ref().and_then(|r| r.band).unwrap_or(0)
    }

    fn render_enabled(&self) -> bool {
        self.render.as_ref().and_then(|r| r.enabled).unwrap_or(true)
    }

    fn bundle_enabled(&self) -> bool {
        self.load.bundle.unwrap_or(false)
    }

    fn price_source(&self) -> Option<&str> {
        self.market.as_ref().map(|m| m.source.as_str())
    }

    fn ticker(&self) -> Option<&str> {
        self.market.as_ref().and_then(|m| m.ticker.as_deref())
    }

    fn concurrent_loads(&self) -> usize {
        self.source.concurrent_loads.unwrap_or(4)
    }

    fn request_timeout_seconds(&self) -> Option<u64> {
        self.market.as_ref().and_then(|m| m.timeout_seconds)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
