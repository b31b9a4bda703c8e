//! Material volume estimates from per-pixel height change.
//!
//! Pixel values are read as elevation in metres, so this is only meaningful
//! for DEM-style scenes or after calibration against ground truth.

use crate::domain::model::{ChangeResult, VolumeEstimate};

/// 10 m x 10 m, the Sentinel-2 visible band resolution.
pub const DEFAULT_PIXEL_AREA_M2: f64 = 100.0;

pub fn estimate_volume(change: &ChangeResult, pixel_area_m2: f64) -> VolumeEstimate {
    let (removed, added) = change
        .difference
        .iter()
        .filter(|d| d.is_finite())
        .map(|d| d * pixel_area_m2)
        .fold((0.0_f64, 0.0_f64), |(removed, added), v| {
            if v < 0.0 {
                (removed - v, added)
            } else {
                (removed, added + v)
            }
        });

    let estimate = VolumeEstimate {
        period: change.period.clone(),
        material_removed_m3: removed,
        material_added_m3: added,
        net_change_m3: added - removed,
    };

    tracing::info!(
        "Volume estimation for {}: removed {:.2} m³, added {:.2} m³, net {:.2} m³",
        estimate.period,
        estimate.material_removed_m3,
        estimate.material_added_m3,
        estimate.net_change_m3
    );

    estimate
}

pub fn estimate_volumes(changes: &[ChangeResult], pixel_area_m2: f64) -> Vec<VolumeEstimate> {
    changes
        .iter()
        .map(|change| estimate_volume(change, pixel_area_m2))
        .collect()
}
