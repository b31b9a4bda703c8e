use crate::core::{ExtractedData, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::{SystemMonitor, Workload};

pub struct ChangeEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ChangeEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🛰️ Starting change analysis");
        self.monitor.record("Start", Workload::default());

        // Extract
        tracing::info!("Loading images...");
        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            "Loaded {} scene(s){}",
            extracted.scenes.len(),
            if extracted.prices.is_some() {
                " and a price series"
            } else {
                ""
            }
        );
        let mut workload = workload_of(&extracted);
        self.monitor.record("Extract", workload);

        // Transform
        tracing::info!("Comparing images...");
        let result = self.pipeline.transform(extracted).await?;
        tracing::info!(
            "Compared {} period(s), estimated {} volume change(s)",
            result.changes.len(),
            result.volumes.len()
        );
        workload.periods = result.changes.len();
        self.monitor.record("Transform", workload);

        // Load
        tracing::info!("Writing outputs...");
        let output_path = self.pipeline.load(result).await?;
        self.monitor.record("Load", workload);
        self.monitor.log_summary();

        tracing::info!("Analysis complete, output saved to: {}", output_path);
        Ok(output_path)
    }
}

fn workload_of(extracted: &ExtractedData) -> Workload {
    Workload {
        scenes: extracted.scenes.len(),
        samples: extracted.scenes.values().map(|scene| scene.data.len()).sum(),
        periods: 0,
    }
}
