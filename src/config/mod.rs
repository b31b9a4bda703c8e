pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::render::{DEFAULT_DISPLAY_RANGE, DEFAULT_SIGNIFICANCE_RATIO};
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "satellite-inference")]
#[command(about = "Detect change between dated satellite scenes of an extraction site")]
pub struct CliConfig {
    /// Directory holding the dated GeoTIFF scenes
    #[arg(long, default_value = "./data/raw")]
    pub data_dir: String,

    #[arg(long, default_value = "./results")]
    pub output_path: String,

    /// Ground area of one pixel in square metres
    #[arg(long, default_value_t = crate::core::volume::DEFAULT_PIXEL_AREA_M2)]
    pub pixel_area: f64,

    /// Fraction of the period's max change below which pixels are dropped from the significance panel
    #[arg(long, default_value_t = DEFAULT_SIGNIFICANCE_RATIO)]
    pub significance_ratio: f64,

    /// Colour range (+/-) of the raw and absolute difference panels
    #[arg(long, default_value_t = DEFAULT_DISPLAY_RANGE)]
    pub display_range: f64,

    /// Band rendered in the heatmaps (0-based)
    #[arg(long, default_value = "0")]
    pub band: usize,

    #[arg(long, help = "Skip heatmap rendering")]
    pub no_render: bool,

    #[arg(long, help = "Bundle all outputs into change_report.zip")]
    pub bundle: bool,

    /// Daily price CSV, as a local path or http(s) URL
    #[arg(long)]
    pub prices: Option<String>,

    /// Ticker label for the price series (defaults to the source file name)
    #[arg(long)]
    pub ticker: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long, default_value = "4")]
    pub concurrent_loads: usize,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn data_dir(&self) -> &str {
        &self.data_dir
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn pixel_area_m2(&self) -> f64 {
        self.pixel_area
    }

    fn significance_ratio(&self) -> f64 {
        self.significance_ratio
    }

    fn display_range(&self) -> f64 {
        self.display_range
    }

    fn render_band(&self) -> usize {
        self.band
    }

    fn render_enabled(&self) -> bool {
        !self.no_render
    }

    fn bundle_enabled(&self) -> bool {
        self.bundle
    }

    fn price_source(&self) -> Option<&str> {
        self.prices.as_deref()
    }

    fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    fn concurrent_loads(&self) -> usize {
        self.concurrent_loads
    }

    fn request_timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_positive_float("pixel_area", self.pixel_area)?;
        validation::validate_positive_float("display_range", self.display_range)?;
        validation::validate_float_range(
            "significance_ratio",
            self.significance_ratio,
            0.0,
            1.0,
        )?;
        validation::validate_positive_number("concurrent_loads", self.concurrent_loads, 1)?;

        if let Some(ticker) = &self.ticker {
            validation::validate_non_empty_string("ticker", ticker)?;
            validation::validate_required_field("prices", &self.prices)?;
        }
        if let Some(prices) = &self.prices {
            validation::validate_price_source("prices", prices)?;
        }

        Ok(())
    }
}
