use std::time::Duration;
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, RefreshKind, System};

/// What a pipeline phase holds in memory when it is sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Workload {
    pub scenes: usize,
    /// 已解碼的 f64 樣本數 (所有場景、所有波段)
    pub samples: usize,
    pub periods: usize,
}

impl Workload {
    pub fn describe(&self) -> String {
        format!(
            "{} scene(s), {:.2} Msamples, {} period(s)",
            self.scenes,
            self.samples as f64 / 1_000_000.0,
            self.periods
        )
    }
}

#[derive(Debug, Clone)]
pub struct PhaseSample {
    pub phase: String,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub elapsed: Duration,
    pub workload: Workload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub peak_phase: String,
    pub peak_memory_mb: u64,
    /// 峰值記憶體平均到每個場景；沒有場景時為 None
    pub memory_per_scene_mb: Option<f64>,
    pub total_time: Duration,
}

/// Peak memory across the recorded phases, attributed to the scenes loaded at that point.
pub fn summarize(samples: &[PhaseSample]) -> Option<RunSummary> {
    let peak = samples.iter().max_by_key(|s| s.memory_mb)?;
    let total_time = samples.iter().map(|s| s.elapsed).max().unwrap_or_default();

    Some(RunSummary {
        peak_phase: peak.phase.clone(),
        peak_memory_mb: peak.memory_mb,
        memory_per_scene_mb: (peak.workload.scenes > 0)
            .then(|| peak.memory_mb as f64 / peak.workload.scenes as f64),
        total_time,
    })
}

/// 每個階段記錄 CPU / 記憶體，並附上當時的場景數量，方便估算解碼成本
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    samples: Mutex<Vec<PhaseSample>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("Could not resolve current PID, system monitoring disabled");
        }

        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();

        Self {
            system: Mutex::new(system),
            pid,
            start_time: Instant::now(),
            samples: Mutex::new(Vec::new()),
            enabled: enabled && pid.is_some(),
        }
    }

    fn sample(&self, phase: &str, workload: Workload) -> Option<PhaseSample> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;

        Some(PhaseSample {
            phase: phase.to_string(),
            cpu_usage: process.cpu_usage(),
            memory_mb: process.memory() / 1024 / 1024,
            elapsed: self.start_time.elapsed(),
            workload,
        })
    }

    /// Sample the process and log it next to the phase's scene workload.
    pub fn record(&self, phase: &str, workload: Workload) {
        let Some(sample) = self.sample(phase, workload) else {
            return;
        };

        tracing::info!(
            "📊 {} [{}] - CPU: {:.1}%, Memory: {}MB, Time: {:?}",
            sample.phase,
            sample.workload.describe(),
            sample.cpu_usage,
            sample.memory_mb,
            sample.elapsed
        );

        if let Ok(mut samples) = self.samples.lock() {
            samples.push(sample);
        }
    }

    pub fn log_summary(&self) {
        let Ok(samples) = self.samples.lock() else {
            return;
        };
        let Some(summary) = summarize(&samples) else {
            return;
        };

        match summary.memory_per_scene_mb {
            Some(per_scene) => tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB during {} (~{:.1}MB per scene)",
                summary.total_time,
                summary.peak_memory_mb,
                summary.peak_phase,
                per_scene
            ),
            None => tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB during {}",
                summary.total_time,
                summary.peak_memory_mb,
                summary.peak_phase
            ),
        }
    }

    pub fn samples(&self) -> Vec<PhaseSample> {
        self.samples
            .lock()
            .map(|samples| samples.clone())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn record(&self, _phase: &str, _workload: Workload) {}

    pub fn log_summary(&self) {}

    pub fn samples(&self) -> Vec<PhaseSample> {
        Vec::new()
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(phase: &str, memory_mb: u64, secs: u64, scenes: usize) -> PhaseSample {
        PhaseSample {
            phase: phase.to_string(),
            cpu_usage: 0.0,
            memory_mb,
            elapsed: Duration::from_secs(secs),
            workload: Workload {
                scenes,
                samples: scenes * 1_000_000,
                periods: scenes.saturating_sub(1),
            },
        }
    }

    #[test]
    fn test_workload_description() {
        let workload = Workload {
            scenes: 4,
            samples: 2_500_000,
            periods: 3,
        };
        assert_eq!(
            workload.describe(),
            "4 scene(s), 2.50 Msamples, 3 period(s)"
        );
    }

    #[test]
    fn test_summary_attributes_peak_to_loaded_scenes() {
        let samples = vec![
            sample("Start", 20, 0, 0),
            sample("Extract", 420, 3, 4),
            sample("Transform", 380, 5, 4),
        ];

        let summary = summarize(&samples).unwrap();
        assert_eq!(summary.peak_phase, "Extract");
        assert_eq!(summary.peak_memory_mb, 420);
        assert_eq!(summary.memory_per_scene_mb, Some(105.0));
        assert_eq!(summary.total_time, Duration::from_secs(5));
    }

    #[test]
    fn test_summary_without_scenes() {
        let summary = summarize(&[sample("Start", 20, 0, 0)]).unwrap();
        assert_eq!(summary.memory_per_scene_mb, None);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        monitor.record("Extract", Workload::default());
        monitor.log_summary();
        assert!(monitor.samples().is_empty());
    }
}
