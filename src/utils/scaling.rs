// src/utils/scaling.rs
//! Presentation remaps of index rasters.

use ndarray::{Array2, ArrayView2};

/// Nodata written to float32 rasters.
pub const FLOAT_NODATA: f32 = -999.0;

/// Nodata written to fixed-point int16 rasters.
pub const FIXED_POINT_NODATA: i16 = -10000;

/// Largest fixed-point scale whose values cannot reach the nodata value or
/// overflow int16.
pub const MAX_SCALE_FACTOR: i32 = 10000;

/// Largest magnitude stored in fixed point, so `scale_factor` 10000 stays
/// clear of the nodata value.
const FIXED_POINT_LIMIT: f64 = 0.9999;

/// Scale index values into int16. Masked (NaN) pixels and the float nodata
/// value map to `nodata_value`.
pub fn to_fixed_point(data: &[f64], scale_factor: i32, nodata_value: i16) -> Vec<i16> {
    data.iter()
        .map(|&value| {
            if value.is_nan() || value == FLOAT_NODATA as f64 {
                nodata_value
            } else {
                let clamped = value.clamp(-FIXED_POINT_LIMIT, FIXED_POINT_LIMIT);
                (clamped * scale_factor as f64).round() as i16
            }
        })
        .collect()
}

/// Masked pixels as float nodata, everything else narrowed to f32.
pub fn to_float_nodata(data: &[f64]) -> Vec<f32> {
    data.iter()
        .map(|&v| if v.is_nan() { FLOAT_NODATA } else { v as f32 })
        .collect()
}

/// Map an index in [-1, 1] to 8-bit grey via `(v + 1) * 127.5`.
/// Masked (NaN) pixels render black.
pub fn to_display_u8(values: ArrayView2<'_, f64>) -> Array2<u8> {
    values.mapv(|v| {
        if v.is_nan() {
            0
        } else {
            ((v.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fixed_point_clamps_and_masks() {
        let out = to_fixed_point(&[0.5, 1.0, -1.0, f64::NAN, -999.0], 10000, FIXED_POINT_NODATA);
        assert_eq!(out, vec![5000, 9999, -9999, -10000, -10000]);
    }

    #[test]
    fn display_remap_endpoints() {
        let img = to_display_u8(array![[-1.0, 0.0, 1.0, f64::NAN]].view());
        assert_eq!(img, array![[0u8, 128, 255, 0]]);
    }

    #[test]
    fn float_nodata_replaces_nan() {
        assert_eq!(to_float_nodata(&[0.25, f64::NAN]), vec![0.25f32, -999.0]);
    }
}
