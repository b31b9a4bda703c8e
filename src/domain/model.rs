use crate::core::market::{MarketCorrelation, PriceSeries};
use chrono::NaiveDate;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Affine pixel → map transform for a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up images.
    pub pixel_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    pub transform: GeoTransform,
    pub bounds: Bounds,
    pub epsg: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub sample_format: String,
    pub geo: Option<GeoReference>,
}

/// How a scene's acquisition date was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Filename,
    FileTime,
}

/// 一個已解碼的場景，資料排列為 (bands, rows, cols)
#[derive(Debug, Clone)]
pub struct Scene {
    pub date: NaiveDate,
    pub date_source: DateSource,
    pub data: Array3<f64>,
    pub metadata: SceneMetadata,
}

impl Scene {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            date: self.date,
            date_source: self.date_source,
            path: self.metadata.path.display().to_string(),
            width: self.metadata.width,
            height: self.metadata.height,
            band_count: self.metadata.band_count,
            sample_format: self.metadata.sample_format.clone(),
            epsg: self.metadata.geo.as_ref().and_then(|g| g.epsg),
            bounds: self.metadata.geo.as_ref().map(|g| g.bounds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub date: NaiveDate,
    pub date_source: DateSource,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub sample_format: String,
    pub epsg: Option<u16>,
    pub bounds: Option<Bounds>,
}

#[derive(Debug)]
pub struct ExtractedData {
    pub scenes: BTreeMap<NaiveDate, Scene>,
    pub prices: Option<PriceSeries>,
}

/// Differences between two consecutive scenes, later minus earlier.
#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub period: String,
    pub date1: NaiveDate,
    pub date2: NaiveDate,
    pub difference: Array3<f64>,
    pub abs_difference: Array3<f64>,
    pub percentage_change: Array3<f64>,
    pub total_difference: f64,
    pub mean_difference: f64,
    pub max_difference: f64,
}

impl ChangeResult {
    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            period: self.period.clone(),
            date1: self.date1,
            date2: self.date2,
            total_difference: self.total_difference,
            mean_difference: self.mean_difference,
            max_difference: self.max_difference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub period: String,
    pub date1: NaiveDate,
    pub date2: NaiveDate,
    pub total_difference: f64,
    pub mean_difference: f64,
    pub max_difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEstimate {
    pub period: String,
    pub material_removed_m3: f64,
    pub material_added_m3: f64,
    pub net_change_m3: f64,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub scenes: Vec<SceneSummary>,
    pub changes: Vec<ChangeResult>,
    pub volumes: Vec<VolumeEstimate>,
    pub correlation: Option<MarketCorrelation>,
}

/// `analysis_report.json` 的內容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub scenes: Vec<SceneSummary>,
    pub comparisons: Vec<ChangeStats>,
    pub volumes: Vec<VolumeEstimate>,
    pub correlation: Option<MarketCorrelation>,
}

pub fn period_label(date1: NaiveDate, date2: NaiveDate) -> String {
    format!(
        "{}_to_{}",
        date1.format("%Y-%m-%d"),
        date2.format("%Y-%m-%d")
    )
}
