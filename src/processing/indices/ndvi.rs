// src/processing/indices/ndvi.rs
use super::IndexCalculator;

/// Normalized Difference Vegetation Index: `(NIR - Red) / (NIR + Red)`
///
/// Bands: NIR, Red.
pub struct NDVI {
    name: String,
}

impl NDVI {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| "NDVI".to_string()),
        }
    }
}

impl IndexCalculator for NDVI {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_bands(&self) -> usize {
        2
    }

    fn numerator(&self, bands: &[f64]) -> f64 {
        bands[0] - bands[1]
    }

    fn denominator(&self, bands: &[f64]) -> f64 {
        bands[0] + bands[1]
    }
}

/// Single-pixel NDVI; `NaN` when `nir + red == 0`.
pub fn ndvi(nir: f64, red: f64) -> f64 {
    NDVI::new(None).calculate_pixel(&[nir, red])
}
