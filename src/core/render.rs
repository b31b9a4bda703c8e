//! Change heatmaps.
//!
//! Each period is rendered as three panels side by side: the raw difference
//! on a diverging red/white/blue map, the absolute difference on a "hot" map,
//! and the absolute difference with insignificant pixels zeroed out.

use crate::domain::model::ChangeResult;
use crate::utils::error::{InferenceError, Result};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayView2;
use std::io::Cursor;

pub const DEFAULT_DISPLAY_RANGE: f64 = 500.0;
pub const DEFAULT_SIGNIFICANCE_RATIO: f64 = 0.1;
pub const PANEL_GUTTER: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub band: usize,
    pub display_range: f64,
    pub significance_ratio: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            band: 0,
            display_range: DEFAULT_DISPLAY_RANGE,
            significance_ratio: DEFAULT_SIGNIFICANCE_RATIO,
        }
    }
}

// RdBu 色階的控制點（負值為紅、正值為藍）
const RD_BU: [[f64; 3]; 5] = [
    [103.0, 0.0, 31.0],
    [214.0, 96.0, 77.0],
    [247.0, 247.0, 247.0],
    [67.0, 147.0, 195.0],
    [5.0, 48.0, 97.0],
];

fn normalize(value: f64, vmin: f64, vmax: f64) -> f64 {
    if !value.is_finite() || vmax <= vmin {
        return 0.0;
    }
    ((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0)
}

fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Diverging colour for `t` in `[0, 1]`.
pub fn rd_bu(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let segments = (RD_BU.len() - 1) as f64;
    let pos = t * segments;
    let idx = (pos.floor() as usize).min(RD_BU.len() - 2);
    let frac = pos - idx as f64;
    let (a, b) = (RD_BU[idx], RD_BU[idx + 1]);
    let mix = |k: usize| (a[k] + (b[k] - a[k]) * frac).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Black → red → yellow → white for `t` in `[0, 1]`.
pub fn hot(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    Rgb([
        channel(3.0 * t),
        channel(3.0 * t - 1.0),
        channel(3.0 * t - 2.0),
    ])
}

pub fn render_change(change: &ChangeResult, options: &RenderOptions) -> Result<RgbImage> {
    let bands = change.difference.shape()[0];
    if options.band >= bands {
        return Err(InferenceError::ProcessingError {
            message: format!(
                "render band {} out of range for {} ({} band(s))",
                options.band, change.period, bands
            ),
        });
    }

    let difference = change.difference.index_axis(ndarray::Axis(0), options.band);
    let abs_difference = change
        .abs_difference
        .index_axis(ndarray::Axis(0), options.band);
    let (rows, cols) = difference.dim();

    let panel_width = cols as u32;
    let height = rows as u32;
    let width = panel_width * 3 + PANEL_GUTTER * 2;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    let range = options.display_range;
    let threshold = options.significance_ratio * change.max_difference;

    paint(&mut canvas, 0, difference, |v| {
        rd_bu(normalize(v, -range, range))
    });
    paint(
        &mut canvas,
        panel_width + PANEL_GUTTER,
        abs_difference,
        |v| hot(normalize(v, 0.0, range)),
    );
    paint(
        &mut canvas,
        (panel_width + PANEL_GUTTER) * 2,
        abs_difference,
        |v| {
            let v = if v < threshold { 0.0 } else { v };
            hot(normalize(v, 0.0, change.max_difference))
        },
    );

    Ok(canvas)
}

fn paint<F>(canvas: &mut RgbImage, x_offset: u32, values: ArrayView2<f64>, color: F)
where
    F: Fn(f64) -> Rgb<u8>,
{
    for ((row, col), value) in values.indexed_iter() {
        canvas.put_pixel(x_offset + col as u32, row as u32, color(*value));
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn heatmap_filename(change: &ChangeResult) -> String {
    format!("change_{}.png", change.period)
}
