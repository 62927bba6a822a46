// src/io/files.rs
//! Pick a reader or writer from the file extension and the enabled
//! features: GDAL rasters when built with `gdal`, pictures otherwise.

use std::path::Path;

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::raster::GeoInfo;
use crate::utils::scaling::MAX_SCALE_FACTOR;

/// Output encoding of an index raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Float32,
    FixedPoint { scale_factor: i32 },
}

impl OutputEncoding {
    pub fn new(float: bool, scale_factor: i32) -> Result<Self> {
        if float {
            return Ok(OutputEncoding::Float32);
        }
        if scale_factor <= 0 || scale_factor > MAX_SCALE_FACTOR {
            return Err(Error::invalid(
                "scale_factor",
                scale_factor,
                format!("must be in 1..={MAX_SCALE_FACTOR} to keep values clear of int16 nodata"),
            ));
        }
        Ok(OutputEncoding::FixedPoint { scale_factor })
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn is_picture(path: &Path) -> bool {
    matches!(extension(path).as_str(), "png" | "jpg" | "jpeg")
}

/// One band as f64, with georeferencing when the format carries it.
pub fn read_band_file(path: &Path) -> Result<(Array2<f64>, Option<GeoInfo>)> {
    #[cfg(feature = "gdal")]
    if !is_picture(path) {
        let (band, info) = super::raster::read_band(path)?;
        return Ok((band, Some(info)));
    }

    let mut bands = super::image::load_bands(path)?;
    if bands.len() > 2 {
        log::warn!("{}: {} channels, using the first as the band", path.display(), bands.len());
    }
    if bands.is_empty() {
        return Err(Error::EmptyInput("image channels"));
    }
    Ok((bands.swap_remove(0), None))
}

/// Integer label raster, with georeferencing when the format carries it.
pub fn read_label_file(path: &Path) -> Result<(Array2<i64>, Option<GeoInfo>)> {
    #[cfg(feature = "gdal")]
    if !is_picture(path) {
        let (labels, info) = super::raster::read_labels(path)?;
        return Ok((labels, Some(info)));
    }

    Ok((super::image::load_labels(path)?, None))
}

/// Write an index raster: PNG/JPEG get the 8-bit display rendering, other
/// extensions a GeoTIFF in `encoding` (needs the `gdal` feature).
pub fn write_index_output(
    values: ArrayView2<'_, f64>,
    geo: Option<&GeoInfo>,
    path: &Path,
    encoding: OutputEncoding,
    description: &str,
) -> Result<()> {
    if is_picture(path) {
        return super::image::save_display(path, values);
    }

    #[cfg(feature = "gdal")]
    {
        let (height, width) = values.dim();
        let fallback = GeoInfo {
            width,
            height,
            ..GeoInfo::default()
        };
        super::raster::write_index(values, geo.unwrap_or(&fallback), path, encoding, description)
    }

    #[cfg(not(feature = "gdal"))]
    {
        let _ = (geo, encoding, description);
        Err(Error::Unsupported(format!(
            "{}: raster output needs the `gdal` feature; use a .png path for a rendering",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn png_output_is_a_display_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi.png");
        let values = array![[-1.0, 1.0], [f64::NAN, 0.0]];
        write_index_output(values.view(), None, &path, OutputEncoding::Float32, "NDVI").unwrap();

        let (labels, geo) = read_label_file(&path).unwrap();
        assert!(geo.is_none());
        assert_eq!(labels, array![[0i64, 255], [0, 128]]);
    }

    #[test]
    fn encoding_rejects_non_positive_scale() {
        assert!(OutputEncoding::new(false, 0).is_err());
        assert_eq!(OutputEncoding::new(true, 0).unwrap(), OutputEncoding::Float32);
    }

    #[test]
    fn encoding_rejects_scale_reaching_nodata() {
        assert!(matches!(
            OutputEncoding::new(false, 20000),
            Err(Error::InvalidParameter { name: "scale_factor", .. })
        ));
        assert!(OutputEncoding::new(false, 40000).is_err());
        assert_eq!(
            OutputEncoding::new(false, MAX_SCALE_FACTOR).unwrap(),
            OutputEncoding::FixedPoint { scale_factor: 10000 }
        );
    }
}
