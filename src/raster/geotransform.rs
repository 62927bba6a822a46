// src/raster/geotransform.rs
//! Affine pixel to map coordinate transform, GDAL coefficient order.

use serde::{Deserialize, Serialize};

/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
///
/// North-up rasters have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the upper-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::from_gdal([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn from_gdal(c: [f64; 6]) -> Self {
        let [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height] = c;
        Self {
            origin_x,
            pixel_width,
            row_rotation,
            origin_y,
            col_rotation,
            pixel_height,
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinates of the pixel centre.
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the pixel's upper-left corner.
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Fractional (col, row) of a map coordinate; NaN when the transform
    /// cannot be inverted.
    ///
    /// Singularity is judged relative to the coefficient magnitudes, so
    /// sub-metre pixels in degrees still invert.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let scale = (self.pixel_width * self.pixel_height).abs() + (self.row_rotation * self.col_rotation).abs();
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() || det.abs() <= 1e-12 * scale {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Integer (row, col) of the pixel containing a map coordinate, or
    /// `None` when it falls outside a raster of `shape` = (rows, cols).
    pub fn rowcol(&self, x: f64, y: f64, shape: (usize, usize)) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        let (col, row) = (col.floor(), row.floor());
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < shape.0 && col < shape.1).then_some((row, col))
    }

    /// Ground size of one pixel as (|x|, |y|).
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10 && self.col_rotation.abs() < 1e-10 && self.pixel_height < 0.0
    }
}

impl Default for GeoTransform {
    /// Identity-like pixel grid: one unit per pixel, y growing upwards.
    fn default() -> Self {
        Self::north_up(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centre_round_trips_through_inverse() {
        let gt = GeoTransform::north_up(500_000.0, 4_200_000.0, 30.0, -30.0);
        let (x, y) = gt.pixel_to_geo(4, 7);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 4.5, epsilon = 1e-9);
        assert_relative_eq!(row, 7.5, epsilon = 1e-9);
        assert_eq!(gt.rowcol(x, y, (10, 10)), Some((7, 4)));
    }

    #[test]
    fn rowcol_outside_raster_is_none() {
        let gt = GeoTransform::north_up(0.0, 100.0, 10.0, -10.0);
        assert_eq!(gt.rowcol(-1.0, 50.0, (10, 10)), None);
        assert_eq!(gt.rowcol(5.0, 101.0, (10, 10)), None);
        assert_eq!(gt.rowcol(105.0, 50.0, (10, 10)), None);
        assert_eq!(gt.rowcol(95.0, 5.0, (10, 10)), Some((9, 9)));
    }

    #[test]
    fn degenerate_transform_has_no_inverse() {
        let gt = GeoTransform::north_up(0.0, 0.0, 0.0, -1.0);
        let (col, row) = gt.geo_to_pixel(1.0, 1.0);
        assert!(col.is_nan() && row.is_nan());
        assert_eq!(gt.rowcol(1.0, 1.0, (5, 5)), None);
    }

    #[test]
    fn degree_sized_pixels_invert() {
        // ~0.5 m pixels in a geographic CRS
        let gt = GeoTransform::north_up(-75.0, 45.0, 4.5e-6, -4.5e-6);
        let (x, y) = gt.pixel_to_geo(10, 20);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 10.5, epsilon = 1e-6);
        assert_relative_eq!(row, 20.5, epsilon = 1e-6);
        assert_eq!(gt.rowcol(x, y, (100, 100)), Some((20, 10)));
    }

    #[test]
    fn collinear_rotated_axes_have_no_inverse() {
        let gt = GeoTransform::from_gdal([0.0, 2.0, 1.0, 0.0, 4.0, 2.0]);
        let (col, row) = gt.geo_to_pixel(3.0, 3.0);
        assert!(col.is_nan() && row.is_nan());
    }

    #[test]
    fn gdal_order_and_pixel_size() {
        let c = [10.0, 20.0, 0.0, 50.0, 0.0, -25.0];
        let gt = GeoTransform::from_gdal(c);
        assert_eq!(gt.to_gdal(), c);
        assert_eq!(gt.pixel_size(), (20.0, 25.0));
        assert!(gt.is_north_up());
    }
}
