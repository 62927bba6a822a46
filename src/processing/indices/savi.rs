// src/processing/indices/savi.rs
use serde::{Deserialize, Serialize};

use super::IndexCalculator;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaviParams {
    /// Soil brightness correction factor (0 = dense canopy, 1 = sparse)
    pub l: f64,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l: 0.5 }
    }
}

impl SaviParams {
    pub fn validate(&self) -> Result<()> {
        if !self.l.is_finite() || self.l < 0.0 {
            return Err(Error::invalid("L", self.l, "soil factor must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Soil Adjusted Vegetation Index:
/// `((NIR - Red) / (NIR + Red + L)) * (1 + L)`
///
/// Bands: NIR, Red.
pub struct SAVI {
    soil_factor: f64,
    name: String,
}

impl SAVI {
    pub fn new(params: SaviParams, name: Option<String>) -> Self {
        Self {
            soil_factor: params.l,
            name: name.unwrap_or_else(|| "SAVI".to_string()),
        }
    }
}

impl IndexCalculator for SAVI {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_bands(&self) -> usize {
        2
    }

    fn numerator(&self, bands: &[f64]) -> f64 {
        (bands[0] - bands[1]) * (1.0 + self.soil_factor)
    }

    fn denominator(&self, bands: &[f64]) -> f64 {
        bands[0] + bands[1] + self.soil_factor
    }
}

/// Single-pixel SAVI; `NaN` when `nir + red + L == 0`.
pub fn savi(nir: f64, red: f64, l: f64) -> f64 {
    SAVI::new(SaviParams { l }, None).calculate_pixel(&[nir, red])
}
