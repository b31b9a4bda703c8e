//! Change detection between chronologically consecutive scenes.

use crate::domain::model::{period_label, ChangeResult, Scene};
use chrono::NaiveDate;
use ndarray::{Array3, Zip};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Added to the earlier scene's pixel values before dividing.
pub const PERCENT_EPSILON: f64 = 1e-10;

/// Compare every scene with the next one in date order.
///
/// Pairs whose rasters have different shapes are skipped with a warning.
/// Statistics ignore non-finite pixels.
pub fn compare_scenes(scenes: &BTreeMap<NaiveDate, Scene>) -> Vec<ChangeResult> {
    if scenes.len() < 2 {
        tracing::warn!("Need at least two images to compare");
        return Vec::new();
    }

    let ordered: Vec<&Scene> = scenes.values().collect();

    // BTreeMap 已依日期排序；par_windows + collect 保持時間順序
    let results: Vec<ChangeResult> = ordered
        .par_windows(2)
        .filter_map(|pair| compare_pair(pair[0], pair[1]))
        .collect();

    for result in &results {
        tracing::info!(
            "Comparison from {} to {}: total {:.3}, mean {:.6}, max {:.3}",
            result.date1,
            result.date2,
            result.total_difference,
            result.mean_difference,
            result.max_difference
        );
    }

    results
}

pub fn compare_pair(earlier: &Scene, later: &Scene) -> Option<ChangeResult> {
    if earlier.shape() != later.shape() {
        tracing::warn!(
            "Images for {} and {} have different shapes: {:?} vs {:?}",
            earlier.date,
            later.date,
            earlier.shape(),
            later.shape()
        );
        return None;
    }

    warn_on_misalignment(earlier, later);

    Some(difference(earlier.date, later.date, &earlier.data, &later.data))
}

/// Per-pixel `later - earlier` with its absolute value, percentage change and summary stats.
pub fn difference(
    date1: NaiveDate,
    date2: NaiveDate,
    earlier: &Array3<f64>,
    later: &Array3<f64>,
) -> ChangeResult {
    let difference = later - earlier;
    let abs_difference = difference.mapv(f64::abs);
    let percentage_change = Zip::from(&difference)
        .and(earlier)
        .map_collect(|d, e| d / (e + PERCENT_EPSILON) * 100.0);

    let (total, count, max) = abs_difference
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0_usize, 0.0_f64), |(sum, n, max), v| {
            (sum + v, n + 1, max.max(*v))
        });
    let mean = if count > 0 { total / count as f64 } else { 0.0 };

    ChangeResult {
        period: period_label(date1, date2),
        date1,
        date2,
        difference,
        abs_difference,
        percentage_change,
        total_difference: total,
        mean_difference: mean,
        max_difference: max,
    }
}

fn warn_on_misalignment(earlier: &Scene, later: &Scene) {
    let (Some(a), Some(b)) = (&earlier.metadata.geo, &later.metadata.geo) else {
        return;
    };
    if a.epsg != b.epsg {
        tracing::warn!(
            "Scenes {} and {} use different CRS ({:?} vs {:?})",
            earlier.date,
            later.date,
            a.epsg,
            b.epsg
        );
    } else if a.bounds != b.bounds {
        tracing::warn!(
            "Scenes {} and {} cover different extents, differences may include misregistration",
            earlier.date,
            later.date
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DateSource, GeoReference, GeoTransform, SceneMetadata};
    use ndarray::array;

    fn scene(date: &str, data: Array3<f64>) -> Scene {
        let shape = data.shape().to_vec();
        Scene {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            date_source: DateSource::Filename,
            metadata: SceneMetadata {
                path: format!("site_{}.tif", date).into(),
                width: shape[2] as u32,
                height: shape[1] as u32,
                band_count: shape[0],
                sample_format: "f64".to_string(),
                geo: None,
            },
            data,
        }
    }

    fn collection(scenes: Vec<Scene>) -> BTreeMap<NaiveDate, Scene> {
        scenes.into_iter().map(|s| (s.date, s)).collect()
    }

    #[test]
    fn test_difference_statistics() {
        let earlier = array![[[10.0, 20.0], [30.0, 40.0]]];
        let later = array![[[15.0, 10.0], [30.0, 44.0]]];
        let result = difference(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            &earlier,
            &later,
        );

        assert_eq!(result.period, "2023-01-01_to_2023-02-01");
        assert_eq!(result.difference[[0, 0, 1]], -10.0);
        assert_eq!(result.abs_difference[[0, 0, 1]], 10.0);
        assert_eq!(result.total_difference, 19.0);
        assert_eq!(result.mean_difference, 4.75);
        assert_eq!(result.max_difference, 10.0);
        assert!((result.percentage_change[[0, 0, 0]] - 50.0).abs() < 1e-9);
        assert!((result.percentage_change[[0, 0, 1]] + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_change_over_zero_pixel_is_finite() {
        let earlier = array![[[0.0]]];
        let later = array![[[1.0]]];
        let result = difference(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            &earlier,
            &later,
        );
        assert!(result.percentage_change[[0, 0, 0]].is_finite());
        assert!(result.percentage_change[[0, 0, 0]] > 1e11);
    }

    #[test]
    fn test_non_finite_pixels_are_ignored_in_stats() {
        let earlier = array![[[1.0, f64::NAN]]];
        let later = array![[[4.0, 2.0]]];
        let result = difference(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            &earlier,
            &later,
        );
        assert_eq!(result.total_difference, 3.0);
        assert_eq!(result.mean_difference, 3.0);
        assert_eq!(result.max_difference, 3.0);
    }

    #[test]
    fn test_compare_scenes_consecutive_pairs_in_date_order() {
        let scenes = collection(vec![
            scene("2023-03-01", array![[[3.0]]]),
            scene("2023-01-01", array![[[1.0]]]),
            scene("2023-02-01", array![[[2.0]]]),
        ]);

        let results = compare_scenes(&scenes);
        let periods: Vec<_> = results.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(
            periods,
            vec!["2023-01-01_to_2023-02-01", "2023-02-01_to_2023-03-01"]
        );
    }

    #[test]
    fn test_shape_mismatch_pair_is_skipped() {
        let scenes = collection(vec![
            scene("2023-01-01", array![[[1.0, 2.0]]]),
            scene("2023-02-01", array![[[1.0], [2.0]]]),
            scene("2023-03-01", array![[[5.0], [2.0]]]),
        ]);

        let results = compare_scenes(&scenes);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].period, "2023-02-01_to_2023-03-01");
        assert_eq!(results[0].max_difference, 4.0);
    }

    #[test]
    fn test_misaligned_georeferenced_pair_is_still_compared() {
        let geo = |origin_x: f64, epsg: u16| {
            let transform = GeoTransform {
                origin_x,
                origin_y: 7_300_000.0,
                pixel_width: 10.0,
                pixel_height: -10.0,
            };
            Some(GeoReference {
                transform,
                bounds: crate::core::raster::bounds_of(&transform, 1, 1),
                epsg: Some(epsg),
            })
        };
        let mut earlier = scene("2023-01-01", array![[[1.0]]]);
        earlier.metadata.geo = geo(500_000.0, 32719);
        let mut shifted = scene("2023-02-01", array![[[3.0]]]);
        shifted.metadata.geo = geo(500_010.0, 32719);
        let mut reprojected = scene("2023-03-01", array![[[6.0]]]);
        reprojected.metadata.geo = geo(500_010.0, 4326);

        let results = compare_scenes(&collection(vec![earlier, shifted, reprojected]));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].max_difference, 2.0);
        assert_eq!(results[1].max_difference, 3.0);
    }

    #[test]
    fn test_single_scene_yields_nothing() {
        let scenes = collection(vec![scene("2023-01-01", array![[[1.0]]])]);
        assert!(compare_scenes(&scenes).is_empty());
    }
}
