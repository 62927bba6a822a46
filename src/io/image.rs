// src/io/image.rs
//! Pictures through the `image` crate: PNG, JPEG and plain TIFF.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageReader};
use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::utils::scaling::to_display_u8;

/// Luminance weights applied to [0, 1] RGB channels.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

fn open(path: &Path) -> Result<DynamicImage> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    log::debug!(
        "{}: {}x{} {:?}",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

fn shape(img: &DynamicImage) -> (usize, usize) {
    (img.height() as usize, img.width() as usize)
}

fn into_array<T>(shape: (usize, usize), data: Vec<T>) -> Result<Array2<T>> {
    Array2::from_shape_vec(shape, data).map_err(|e| Error::Unsupported(format!("pixel buffer layout: {e}")))
}

/// Luminance of an image in [0, 1].
pub fn to_grayscale(img: &DynamicImage) -> Result<Array2<f64>> {
    let rgb = img.to_rgb32f();
    let data = rgb
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b).clamp(0.0, 1.0) as f64
        })
        .collect();
    into_array(shape(img), data)
}

pub fn load_grayscale(path: &Path) -> Result<Array2<f64>> {
    to_grayscale(&open(path)?)
}

/// Label raster from a single-band picture. 8 and 16 bit grey values are
/// kept as-is; other layouts are reduced to 8-bit luminance first.
pub fn load_labels(path: &Path) -> Result<Array2<i64>> {
    let img = open(path)?;
    let dims = shape(&img);
    let data: Vec<i64> = match &img {
        DynamicImage::ImageLuma8(buf) => buf.as_raw().iter().map(|&v| v as i64).collect(),
        DynamicImage::ImageLuma16(buf) => buf.as_raw().iter().map(|&v| v as i64).collect(),
        other => {
            log::warn!("{}: {:?} is not a single-band label image, using luminance", path.display(), other.color());
            other.to_luma8().into_raw().into_iter().map(i64::from).collect()
        }
    };
    into_array(dims, data)
}

/// One [0, 1] band per colour channel (grey, grey+alpha, RGB or RGBA).
pub fn load_bands(path: &Path) -> Result<Vec<Array2<f64>>> {
    let img = open(path)?;
    let dims = shape(&img);
    let channels = img.color().channel_count() as usize;
    let (raw, stride) = match channels {
        1 | 2 => (img.to_luma_alpha32f().into_raw(), 2),
        _ => (img.to_rgba32f().into_raw(), 4),
    };
    (0..channels)
        .map(|c| {
            let band = raw.iter().skip(c).step_by(stride).map(|&v| v as f64).collect();
            into_array(dims, band)
        })
        .collect()
}

/// Write an 8-bit greyscale picture; format follows the extension.
pub fn save_gray(path: &Path, pixels: ArrayView2<'_, u8>) -> Result<()> {
    let (rows, cols) = pixels.dim();
    let data = pixels.iter().copied().collect();
    let img = GrayImage::from_raw(cols as u32, rows as u32, data)
        .ok_or_else(|| Error::Unsupported("pixel buffer does not match image size".into()))?;
    img.save(path)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Render an index raster with the `(v + 1) * 127.5` display remap.
pub fn save_display(path: &Path, values: ArrayView2<'_, f64>) -> Result<()> {
    save_gray(path, to_display_u8(values).view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn grey_round_trip_preserves_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.png");
        let labels = array![[0u8, 1, 2], [3, 3, 250]];
        save_gray(&path, labels.view()).unwrap();

        let back = load_labels(&path).unwrap();
        assert_eq!(back, labels.mapv(i64::from));
    }

    #[test]
    fn grayscale_uses_luminance_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let img = image::RgbImage::from_raw(2, 1, vec![255, 0, 0, 255, 255, 255]).unwrap();
        img.save(&path).unwrap();

        let gray = load_grayscale(&path).unwrap();
        assert_eq!(gray.dim(), (1, 2));
        assert_relative_eq!(gray[[0, 0]], 0.2125, epsilon = 1e-6);
        assert_relative_eq!(gray[[0, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rgba_splits_into_four_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        let img = image::RgbaImage::from_raw(1, 1, vec![0, 51, 102, 255]).unwrap();
        img.save(&path).unwrap();

        let bands = load_bands(&path).unwrap();
        assert_eq!(bands.len(), 4);
        assert_relative_eq!(bands[1][[0, 0]], 0.2, epsilon = 1e-6);
        assert_relative_eq!(bands[2][[0, 0]], 0.4, epsilon = 1e-6);
        assert_relative_eq!(bands[3][[0, 0]], 1.0, epsilon = 1e-6);
    }
}
