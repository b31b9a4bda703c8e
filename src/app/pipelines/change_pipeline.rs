use crate::core::change::compare_scenes;
use crate::core::dating::scene_date;
use crate::core::market::{correlate, PriceSeries};
use crate::core::raster::{list_scene_files, read_scene};
use crate::core::render::{encode_png, heatmap_filename, render_change, RenderOptions};
use crate::core::volume::estimate_volumes;
use crate::core::{
    AnalysisResult, ConfigProvider, ExtractedData, Pipeline, Scene, Storage,
};
use crate::domain::model::{AnalysisReport, VolumeEstimate};
use crate::utils::error::{InferenceError, Result};
use crate::utils::validation::is_remote_source;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use zip::write::{FileOptions, ZipWriter};

pub const SUMMARY_FILENAME: &str = "change_summary.csv";
pub const REPORT_FILENAME: &str = "analysis_report.json";
pub const BUNDLE_FILENAME: &str = "change_report.zip";

/// 場景 → 變化偵測 → 報表 的 pipeline
pub struct ChangePipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
}

impl<S: Storage, C: ConfigProvider> ChangePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    async fn load_scenes(&self) -> Result<BTreeMap<NaiveDate, Scene>> {
        let data_dir = PathBuf::from(self.config.data_dir());
        tracing::info!("📂 Scanning {} for scenes", data_dir.display());

        let files = tokio::task::spawn_blocking(move || list_scene_files(&data_dir))
            .await
            .map_err(join_error)??;

        // 解碼很耗記憶體，限制同時進行的數量
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_loads().max(1)));
        let mut tasks = JoinSet::new();
        for (index, path) in files.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| InferenceError::ProcessingError {
                    message: format!("scene loader closed: {}", e),
                })?;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let loaded = load_scene(&path);
                (index, path, loaded)
            });
        }

        let mut loaded = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            loaded.push(joined.map_err(join_error)?);
        }
        loaded.sort_by_key(|(index, _, _)| *index);

        let mut scenes = BTreeMap::new();
        for (_, path, result) in loaded {
            match result {
                Ok(scene) => {
                    tracing::info!(
                        "Loaded image for date {} with shape {:?}",
                        scene.date,
                        scene.shape()
                    );
                    if let Some(previous) = scenes.insert(scene.date, scene) {
                        tracing::warn!(
                            "Two scenes dated {}, {} replaced by {}",
                            previous.date,
                            previous.metadata.path.display(),
                            path.display()
                        );
                    }
                }
                Err(e) => tracing::error!("Error loading {}: {}", path.display(), e),
            }
        }

        Ok(scenes)
    }

    async fn load_prices(&self) -> Result<Option<PriceSeries>> {
        let Some(source) = self.config.price_source() else {
            return Ok(None);
        };
        let ticker = self
            .config
            .ticker()
            .map(str::to_string)
            .unwrap_or_else(|| ticker_from_source(source));

        let body = if is_remote_source(source) {
            tracing::debug!("Requesting prices from: {}", source);
            let mut request = self.client.get(source);
            if let Some(timeout) = self.config.request_timeout_seconds() {
                request = request.timeout(std::time::Duration::from_secs(timeout));
            }
            let response = request.send().await?;
            tracing::debug!("Price source response status: {}", response.status());
            if !response.status().is_success() {
                return Err(InferenceError::PriceSourceStatus {
                    url: source.to_string(),
                    status: response.status().as_u16(),
                });
            }
            response.bytes().await?.to_vec()
        } else {
            tokio::fs::read(source).await?
        };

        PriceSeries::from_csv_reader(ticker, body.as_slice()).map(Some)
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            band: self.config.render_band(),
            display_range: self.config.display_range(),
            significance_ratio: self.config.significance_ratio(),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ChangePipeline<S, C> {
    async fn extract(&self) -> Result<ExtractedData> {
        let scenes = self.load_scenes().await?;
        if scenes.len() < 2 {
            return Err(InferenceError::InsufficientScenes {
                found: scenes.len(),
            });
        }

        let prices = self.load_prices().await?;

        Ok(ExtractedData { scenes, prices })
    }

    async fn transform(&self, data: ExtractedData) -> Result<AnalysisResult> {
        let pixel_area = self.config.pixel_area_m2();
        let ExtractedData { scenes, prices } = data;

        let (summaries, changes, volumes) = tokio::task::spawn_blocking(move || {
            let summaries = scenes.values().map(Scene::summary).collect::<Vec<_>>();
            let changes = compare_scenes(&scenes);
            let volumes = estimate_volumes(&changes, pixel_area);
            (summaries, changes, volumes)
        })
        .await
        .map_err(join_error)?;

        if changes.is_empty() {
            tracing::warn!("No comparable scene pairs (all pairs differ in shape)");
        }

        let correlation = prices
            .as_ref()
            .map(|prices| correlate(&changes, &volumes, prices));

        Ok(AnalysisResult {
            scenes: summaries,
            changes,
            volumes,
            correlation,
        })
    }

    async fn load(&self, result: AnalysisResult) -> Result<String> {
        let render = self.config.render_enabled().then(|| self.render_options());

        let artifacts = tokio::task::spawn_blocking(move || build_artifacts(&result, render))
            .await
            .map_err(join_error)??;

        let output_dir = self.config.output_path();

        if self.config.bundle_enabled() {
            tracing::debug!("Creating ZIP file with {} files", artifacts.len());
            let zip_data = bundle(&artifacts)?;
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(BUNDLE_FILENAME, &zip_data).await?;
            return Ok(Path::new(output_dir)
                .join(BUNDLE_FILENAME)
                .display()
                .to_string());
        }

        for (name, data) in &artifacts {
            self.storage.write_file(name, data).await?;
            tracing::info!("Saved {}", Path::new(output_dir).join(name).display());
        }

        Ok(output_dir.to_string())
    }
}

fn load_scene(path: &Path) -> Result<Scene> {
    let (date, date_source) = scene_date(path)?;
    let (data, metadata) = read_scene(path)?;
    Ok(Scene {
        date,
        date_source,
        data,
        metadata,
    })
}

fn join_error(e: tokio::task::JoinError) -> InferenceError {
    InferenceError::ProcessingError {
        message: format!("background task failed: {}", e),
    }
}

/// `data/financial/RIO.csv` → `RIO`
pub fn ticker_from_source(source: &str) -> String {
    let trimmed = source.split(['?', '#']).next().unwrap_or(source);
    Path::new(trimmed.trim_end_matches('/'))
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("PRICE")
        .to_string()
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    period: &'a str,
    date1: NaiveDate,
    date2: NaiveDate,
    total_difference: f64,
    mean_difference: f64,
    max_difference: f64,
    material_removed_m3: Option<f64>,
    material_added_m3: Option<f64>,
    net_change_m3: Option<f64>,
}

fn build_artifacts(
    result: &AnalysisResult,
    render: Option<RenderOptions>,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut artifacts = Vec::new();

    let volumes: BTreeMap<&str, &VolumeEstimate> = result
        .volumes
        .iter()
        .map(|v| (v.period.as_str(), v))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    for change in &result.changes {
        let volume = volumes.get(change.period.as_str());
        writer.serialize(SummaryRow {
            period: &change.period,
            date1: change.date1,
            date2: change.date2,
            total_difference: change.total_difference,
            mean_difference: change.mean_difference,
            max_difference: change.max_difference,
            material_removed_m3: volume.map(|v| v.material_removed_m3),
            material_added_m3: volume.map(|v| v.material_added_m3),
            net_change_m3: volume.map(|v| v.net_change_m3),
        })?;
    }
    let summary = writer
        .into_inner()
        .map_err(|e| InferenceError::IoError(e.into_error()))?;
    artifacts.push((SUMMARY_FILENAME.to_string(), summary));

    let report = AnalysisReport {
        generated_at: chrono::Utc::now(),
        scenes: result.scenes.clone(),
        comparisons: result.changes.iter().map(|c| c.stats()).collect(),
        volumes: result.volumes.clone(),
        correlation: result.correlation.clone(),
    };
    artifacts.push((
        REPORT_FILENAME.to_string(),
        serde_json::to_vec_pretty(&report)?,
    ));

    if let Some(options) = render {
        for change in &result.changes {
            let image = render_change(change, &options)?;
            artifacts.push((heatmap_filename(change), encode_png(&image)?));
        }
    }

    Ok(artifacts)
}

fn bundle(artifacts: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in artifacts {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
