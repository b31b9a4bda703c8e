use crate::domain::model::{AnalysisResult, ExtractedData};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Destination for the run's artifacts; paths are relative to the output location.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    fn pixel_area_m2(&self) -> f64;
    /// Fraction of the period's max change below which pixels are not "significant".
    fn significance_ratio(&self) -> f64;
    /// Symmetric colour range for the raw / absolute difference panels.
    fn display_range(&self) -> f64;
    fn render_band(&self) -> usize;
    fn render_enabled(&self) -> bool;
    fn bundle_enabled(&self) -> bool;
    fn price_source(&self) -> Option<&str>;
    fn ticker(&self) -> Option<&str>;
    fn concurrent_loads(&self) -> usize;
    fn request_timeout_seconds(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractedData>;
    async fn transform(&self, data: ExtractedData) -> Result<AnalysisResult>;
    async fn load(&self, result: AnalysisResult) -> Result<String>;
}
