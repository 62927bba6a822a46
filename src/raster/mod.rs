// src/raster/mod.rs
pub mod geotransform;

pub use geotransform::GeoTransform;

/// Georeferencing carried from an input raster to the outputs derived from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoInfo {
    pub projection: String,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}
