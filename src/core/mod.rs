pub mod change;
pub mod dating;
pub mod engine;
pub mod market;
pub mod raster;
pub mod render;
pub mod volume;

pub use crate::app::pipelines::change_pipeline::ChangePipeline;
pub use crate::domain::model::{
    AnalysisResult, ChangeResult, ExtractedData, Scene, SceneMetadata, VolumeEstimate,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
