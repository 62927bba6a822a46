// src/io/raster.rs
//! GeoTIFF read/write through GDAL.

use std::path::Path;

use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, ArrayView2};

use super::files::OutputEncoding;
use crate::error::{Error, Result};
use crate::raster::{GeoInfo, GeoTransform};
use crate::utils::scaling::{to_fixed_point, to_float_nodata, FIXED_POINT_NODATA, FLOAT_NODATA};

/// First band of a raster as f64; nodata pixels become NaN.
pub fn read_band(path: &Path) -> Result<(Array2<f64>, GeoInfo)> {
    let ds = Dataset::open(path)?;
    let (width, height) = ds.raster_size();
    let info = GeoInfo {
        projection: ds.projection(),
        transform: GeoTransform::from_gdal(ds.geo_transform()?),
        width,
        height,
    };

    let band = ds.rasterband(1)?;
    let nodata = band.no_data_value();
    let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
    let (_, mut data) = buffer.into_shape_and_vec();
    if let Some(nd) = nodata {
        data.iter_mut().filter(|v| **v == nd).for_each(|v| *v = f64::NAN);
    }
    log::debug!("{}: {}x{} band read", path.display(), width, height);

    let values = Array2::from_shape_vec((height, width), data)
        .map_err(|e| Error::Unsupported(format!("raster buffer layout: {e}")))?;
    Ok((values, info))
}

/// Label raster (first band) as integer class ids, with its transform.
pub fn read_labels(path: &Path) -> Result<(Array2<i64>, GeoInfo)> {
    let (values, info) = read_band(path)?;
    // Nodata reads back as NaN and is treated as background
    Ok((values.mapv(|v| if v.is_nan() { 0 } else { v as i64 }), info))
}

/// Write an index raster; NaN pixels become the encoding's nodata value.
pub fn write_index(
    values: ArrayView2<'_, f64>,
    geo: &GeoInfo,
    path: &Path,
    encoding: OutputEncoding,
    description: &str,
) -> Result<()> {
    let (height, width) = values.dim();
    let data: Vec<f64> = values.iter().copied().collect();

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = RasterCreationOptions::from_iter(["COMPRESS=DEFLATE", "TILED=YES", "NUM_THREADS=ALL_CPUS"]);

    match encoding {
        OutputEncoding::FixedPoint { scale_factor } => {
            let mut ds = driver.create_with_band_type_with_options::<i16, _>(path, width, height, 1, &options)?;
            ds.set_projection(&geo.projection)?;
            ds.set_geo_transform(&geo.transform.to_gdal())?;

            let mut band = ds.rasterband(1)?;
            band.set_no_data_value(Some(FIXED_POINT_NODATA as f64))?;
            band.set_metadata_item("SCALE", &format!("{}", 1.0 / scale_factor as f64), "")?;
            band.set_metadata_item("OFFSET", "0", "")?;
            band.set_description(&format!("{description} (scaled)"))?;

            let fixed = to_fixed_point(&data, scale_factor, FIXED_POINT_NODATA);
            let mut buffer = Buffer::new((width, height), fixed);
            band.write((0, 0), (width, height), &mut buffer)?;
            ds.flush_cache()?;
        }
        OutputEncoding::Float32 => {
            let mut ds = driver.create_with_band_type_with_options::<f32, _>(path, width, height, 1, &options)?;
            ds.set_projection(&geo.projection)?;
            ds.set_geo_transform(&geo.transform.to_gdal())?;

            let mut band = ds.rasterband(1)?;
            band.set_no_data_value(Some(FLOAT_NODATA as f64))?;
            band.set_description(description)?;

            let mut buffer = Buffer::new((width, height), to_float_nodata(&data));
            band.write((0, 0), (width, height), &mut buffer)?;
            ds.flush_cache()?;
        }
    }
    log::info!("wrote {} ({:?})", path.display(), encoding);
    Ok(())
}
