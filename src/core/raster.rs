//! GeoTIFF scene decoding.

use crate::domain::model::{Bounds, GeoReference, GeoTransform, SceneMetadata};
use crate::utils::error::{InferenceError, Result};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

const SCENE_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

// GeoTIFF tag codes
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey ids
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;

/// List the `.tif` / `.tiff` files directly inside `dir`, sorted by path.
pub fn list_scene_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_scene = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SCENE_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false);
        if is_scene {
            files.push(path);
        }
    }

    files.sort();

    if files.is_empty() {
        tracing::warn!("No TIFF files found in {}", dir.display());
    } else {
        tracing::info!("Found {} TIFF files", files.len());
    }

    Ok(files)
}

/// Decode every band of the first image directory into a `(bands, rows, cols)` array.
pub fn read_scene(path: &Path) -> Result<(Array3<f64>, SceneMetadata)> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let band_count = band_count(path, decoder.colortype()?)?;

    let planar = decoder
        .find_tag(Tag::PlanarConfiguration)?
        .map(|v| v.into_u16())
        .transpose()?;
    if planar == Some(2) {
        return Err(InferenceError::UnsupportedRaster {
            path: path.display().to_string(),
            reason: "planar-separated band layout".to_string(),
        });
    }

    let geo = read_geo_reference(&mut decoder, width, height)?;

    let (samples, sample_format) = widen_samples(path, decoder.read_image()?)?;
    let data = to_band_major(path, samples, band_count, height as usize, width as usize)?;

    let metadata = SceneMetadata {
        path: path.to_path_buf(),
        width,
        height,
        band_count,
        sample_format: sample_format.to_string(),
        geo,
    };

    Ok((data, metadata))
}

fn band_count(path: &Path, color_type: ColorType) -> Result<usize> {
    let count = match color_type {
        ColorType::Gray(_) | ColorType::Palette(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        ColorType::Multiband { num_samples, .. } => num_samples as usize,
        other => {
            return Err(InferenceError::UnsupportedRaster {
                path: path.display().to_string(),
                reason: format!("colour type {:?}", other),
            })
        }
    };
    Ok(count)
}

#[allow(unreachable_patterns)]
fn widen_samples(path: &Path, result: DecodingResult) -> Result<(Vec<f64>, &'static str)> {
    let widened = match result {
        DecodingResult::U8(v) => (v.into_iter().map(f64::from).collect(), "u8"),
        DecodingResult::U16(v) => (v.into_iter().map(f64::from).collect(), "u16"),
        DecodingResult::U32(v) => (v.into_iter().map(f64::from).collect(), "u32"),
        DecodingResult::U64(v) => (v.into_iter().map(|x| x as f64).collect(), "u64"),
        DecodingResult::I8(v) => (v.into_iter().map(f64::from).collect(), "i8"),
        DecodingResult::I16(v) => (v.into_iter().map(f64::from).collect(), "i16"),
        DecodingResult::I32(v) => (v.into_iter().map(f64::from).collect(), "i32"),
        DecodingResult::I64(v) => (v.into_iter().map(|x| x as f64).collect(), "i64"),
        DecodingResult::F32(v) => (v.into_iter().map(f64::from).collect(), "f32"),
        DecodingResult::F64(v) => (v, "f64"),
        _ => {
            return Err(InferenceError::UnsupportedRaster {
                path: path.display().to_string(),
                reason: "sample format".to_string(),
            })
        }
    };
    Ok(widened)
}

/// 交錯 (chunky) 樣本 → 波段優先
fn to_band_major(
    path: &Path,
    samples: Vec<f64>,
    bands: usize,
    rows: usize,
    cols: usize,
) -> Result<Array3<f64>> {
    let pixels = rows * cols;
    if bands == 0 || samples.len() != pixels * bands {
        return Err(InferenceError::UnsupportedRaster {
            path: path.display().to_string(),
            reason: format!(
                "expected {} samples ({}x{}x{}), decoded {}",
                pixels * bands,
                bands,
                rows,
                cols,
                samples.len()
            ),
        });
    }

    let planes = if bands == 1 {
        samples
    } else {
        let mut planes = vec![0.0; samples.len()];
        for (i, pixel) in samples.chunks_exact(bands).enumerate() {
            for (b, value) in pixel.iter().enumerate() {
                planes[b * pixels + i] = *value;
            }
        }
        planes
    };

    Array3::from_shape_vec((bands, rows, cols), planes).map_err(|e| {
        InferenceError::ProcessingError {
            message: format!("{}: {}", path.display(), e),
        }
    })
}

fn read_geo_reference<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Result<Option<GeoReference>> {
    let scale = f64_tag(decoder, MODEL_PIXEL_SCALE)?;
    let tiepoint = f64_tag(decoder, MODEL_TIEPOINT)?;
    let transformation = f64_tag(decoder, MODEL_TRANSFORMATION)?;
    let geo_keys = match decoder.find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))? {
        Some(value) => Some(value.into_u32_vec()?),
        None => None,
    };

    let Some(transform) =
        geo_transform(scale.as_deref(), tiepoint.as_deref(), transformation.as_deref())
    else {
        return Ok(None);
    };

    Ok(Some(GeoReference {
        transform,
        bounds: bounds_of(&transform, width, height),
        epsg: geo_keys.as_deref().and_then(epsg_from_geo_keys),
    }))
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(Tag::from_u16_exhaustive(code))? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

/// Build the pixel → map transform from either a tiepoint + pixel scale pair
/// or a full 4x4 model transformation matrix.
pub fn geo_transform(
    scale: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
    transformation: Option<&[f64]>,
) -> Option<GeoTransform> {
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
            return Some(GeoTransform {
                origin_x: x - i * scale[0],
                origin_y: y + j * scale[1],
                pixel_width: scale[0],
                pixel_height: -scale[1],
            });
        }
    }

    match transformation {
        Some(m) if m.len() >= 8 => Some(GeoTransform {
            origin_x: m[3],
            origin_y: m[7],
            pixel_width: m[0],
            pixel_height: m[5],
        }),
        _ => None,
    }
}

pub fn bounds_of(transform: &GeoTransform, width: u32, height: u32) -> Bounds {
    let x0 = transform.origin_x;
    let x1 = transform.origin_x + transform.pixel_width * width as f64;
    let y0 = transform.origin_y;
    let y1 = transform.origin_y + transform.pixel_height * height as f64;
    Bounds {
        left: x0.min(x1),
        right: x0.max(x1),
        bottom: y0.min(y1),
        top: y0.max(y1),
    }
}

/// EPSG code from a GeoKey directory; the projected CRS key wins over the geographic one.
pub fn epsg_from_geo_keys(keys: &[u32]) -> Option<u16> {
    if keys.len() < 4 {
        return None;
    }
    let key_count = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(key_count).collect();

    let lookup = |wanted: u32| {
        entries
            .iter()
            // location 0 表示值直接存在 entry 中
            .find(|entry| entry[0] == wanted && entry[1] == 0)
            .and_then(|entry| u16::try_from(entry[3]).ok())
            .filter(|code| *code != 0 && *code != 32767)
    };

    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};
    use tiff::tags::{PhotometricInterpretation, SampleFormat};

    /// 四波段 u16 (例如 B/G/R/NIR)，解碼後為 `ColorType::Multiband`
    struct Gray16x4;
    impl colortype::ColorType for Gray16x4 {
        type Inner = u16;
        const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
        const BITS_PER_SAMPLE: &'static [u16] = &[16, 16, 16, 16];
        const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::Uint; 4];

        // 與 tiff crate 內建整數色彩型別相同的實作 (tiff 0.10 必要的 trait 項目)
        fn horizontal_predict(row: &[Self::Inner], result: &mut Vec<Self::Inner>) {
            let sample_size = Self::SAMPLE_FORMAT.len();

            if row.len() < sample_size {
                debug_assert!(false);
                return;
            }

            let (start, rest) = row.split_at(sample_size);

            result.extend_from_slice(start);
            if result.capacity() - result.len() < rest.len() {
                return;
            }

            result.extend(
                row.iter()
                    .zip(rest)
                    .map(|(prev, current)| current.wrapping_sub(*prev)),
            );
        }
    }

    fn write_gray16(path: &Path, width: u32, height: u32, data: &[u16]) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(width, height, data)
            .unwrap();
    }

    #[test]
    fn test_list_scene_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_20230201.tif", "a_20230101.TIFF", "notes.txt", "c.tiff.bak"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.tif")).unwrap();

        let files = list_scene_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_20230101.TIFF", "b_20230201.tif"]);
    }

    #[test]
    fn test_list_scene_files_missing_dir_is_error() {
        assert!(list_scene_files(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_read_gray16_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site_20230101.tif");
        let data: Vec<u16> = (0..12).map(|v| v * 100).collect();
        write_gray16(&path, 4, 3, &data);

        let (raster, metadata) = read_scene(&path).unwrap();
        assert_eq!(raster.shape(), &[1, 3, 4]);
        assert_eq!(raster[[0, 0, 0]], 0.0);
        assert_eq!(raster[[0, 1, 0]], 400.0);
        assert_eq!(raster[[0, 2, 3]], 1100.0);
        assert_eq!(metadata.band_count, 1);
        assert_eq!(metadata.sample_format, "u16");
        assert!(metadata.geo.is_none());
    }

    #[test]
    fn test_read_rgb_scene_is_band_major() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb_20230101.tif");
        // 2x1 像素: (10,20,30) (40,50,60)
        let data: Vec<u8> = vec![10, 20, 30, 40, 50, 60];
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder.write_image::<colortype::RGB8>(2, 1, &data).unwrap();

        let (raster, metadata) = read_scene(&path).unwrap();
        assert_eq!(raster.shape(), &[3, 1, 2]);
        assert_eq!(metadata.band_count, 3);
        assert_eq!(raster[[0, 0, 0]], 10.0);
        assert_eq!(raster[[0, 0, 1]], 40.0);
        assert_eq!(raster[[2, 0, 1]], 60.0);
    }

    #[test]
    fn test_read_multiband_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s2_20230101.tif");
        // 3x2 像素，每像素 4 個樣本: band b 的值為 1000 * (b + 1) + 像素索引
        let data: Vec<u16> = (0..6u16)
            .flat_map(|i| (0..4u16).map(move |b| 1000 * (b + 1) + i))
            .collect();
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder.write_image::<Gray16x4>(3, 2, &data).unwrap();

        let (raster, metadata) = read_scene(&path).unwrap();
        assert_eq!(raster.shape(), &[4, 2, 3]);
        assert_eq!(metadata.band_count, 4);
        assert_eq!(metadata.sample_format, "u16");
        assert_eq!(raster[[0, 0, 0]], 1000.0);
        assert_eq!(raster[[1, 0, 0]], 2000.0);
        assert_eq!(raster[[3, 0, 2]], 4002.0);
        assert_eq!(raster[[2, 1, 0]], 3003.0);
        assert_eq!(raster[[3, 1, 2]], 4005.0);
    }

    #[test]
    fn test_read_georeferenced_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utm_20230101.tif");
        let data: Vec<u16> = vec![1; 8];
        let geo_keys: [u16; 12] = [
            1, 1, 0, 2, // header
            1024, 0, 1, 1, // model type projected
            3072, 0, 1, 32719, // UTM 19S
        ];

        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<colortype::Gray16>(4, 2).unwrap();
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE),
                &[10.0f64, 10.0, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(MODEL_TIEPOINT),
                &[0.0f64, 0.0, 0.0, 500_000.0, 7_300_000.0, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geo_keys[..])
            .unwrap();
        image.write_data(&data).unwrap();

        let (raster, metadata) = read_scene(&path).unwrap();
        assert_eq!(raster.shape(), &[1, 2, 4]);

        let geo = metadata.geo.unwrap();
        assert_eq!(geo.epsg, Some(32719));
        assert_eq!(geo.transform.origin_x, 500_000.0);
        assert_eq!(geo.transform.pixel_height, -10.0);
        assert_eq!(geo.bounds.left, 500_000.0);
        assert_eq!(geo.bounds.right, 500_040.0);
        assert_eq!(geo.bounds.top, 7_300_000.0);
        assert_eq!(geo.bounds.bottom, 7_299_980.0);
    }

    #[test]
    fn test_read_scene_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_20230101.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(read_scene(&path).is_err());
    }

    #[test]
    fn test_geo_transform_from_tiepoint_and_scale() {
        let transform = geo_transform(
            Some(&[10.0, 10.0, 0.0]),
            Some(&[0.0, 0.0, 0.0, 500_000.0, 7_300_000.0, 0.0]),
            None,
        )
        .unwrap();
        assert_eq!(transform.origin_x, 500_000.0);
        assert_eq!(transform.origin_y, 7_300_000.0);
        assert_eq!(transform.pixel_height, -10.0);

        let bounds = bounds_of(&transform, 100, 50);
        assert_eq!(bounds.left, 500_000.0);
        assert_eq!(bounds.right, 501_000.0);
        assert_eq!(bounds.top, 7_300_000.0);
        assert_eq!(bounds.bottom, 7_299_500.0);
    }

    #[test]
    fn test_geo_transform_from_matrix() {
        let matrix = [
            30.0, 0.0, 0.0, 200_000.0, 0.0, -30.0, 0.0, 4_000_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0,
        ];
        let transform = geo_transform(None, None, Some(&matrix)).unwrap();
        assert_eq!(transform.pixel_width, 30.0);
        assert_eq!(transform.origin_y, 4_000_000.0);
        assert!(geo_transform(Some(&[10.0, 10.0]), None, None).is_none());
    }

    #[test]
    fn test_epsg_prefers_projected_key() {
        let keys = [
            1, 1, 0, 3, // header
            1024, 0, 1, 1, // model type projected
            2048, 0, 1, 4326, // geographic
            3072, 0, 1, 32719, // UTM 19S
        ];
        assert_eq!(epsg_from_geo_keys(&keys), Some(32719));

        let geographic_only = [1, 1, 0, 1, 2048, 0, 1, 4326];
        assert_eq!(epsg_from_geo_keys(&geographic_only), Some(4326));

        let user_defined = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(epsg_from_geo_keys(&user_defined), None);
    }
}
