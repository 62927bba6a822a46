// src/processing/indices/evi.rs
use serde::{Deserialize, Serialize};

use super::IndexCalculator;
use crate::error::{Error, Result};

/// EVI coefficients, MODIS defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EviParams {
    /// Canopy background adjustment
    pub l: f64,
    /// Aerosol resistance (red)
    pub c1: f64,
    /// Aerosol resistance (blue)
    pub c2: f64,
    /// Gain factor
    pub g: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            l: 1.0,
            c1: 6.0,
            c2: 7.5,
            g: 2.5,
        }
    }
}

impl EviParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("L", self.l), ("C1", self.c1), ("C2", self.c2), ("G", self.g)] {
            if !value.is_finite() {
                return Err(Error::invalid(name, value, "EVI constant must be finite"));
            }
        }
        Ok(())
    }
}

/// Enhanced Vegetation Index:
/// `G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
///
/// Bands: NIR, Red, Blue. Unlike the MODIS product no clamping or two-band
/// fallback is applied; only a zero denominator is masked.
pub struct EVI {
    params: EviParams,
    name: String,
}

impl EVI {
    pub fn new(params: EviParams, name: Option<String>) -> Self {
        Self {
            params,
            name: name.unwrap_or_else(|| "EVI".to_string()),
        }
    }

    pub fn params(&self) -> &EviParams {
        &self.params
    }
}

impl IndexCalculator for EVI {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_bands(&self) -> usize {
        3
    }

    fn numerator(&self, bands: &[f64]) -> f64 {
        self.params.g * (bands[0] - bands[1])
    }

    fn denominator(&self, bands: &[f64]) -> f64 {
        let EviParams { l, c1, c2, .. } = self.params;
        bands[0] + c1 * bands[1] - c2 * bands[2] + l
    }
}

/// Single-pixel EVI; `NaN` at a zero denominator.
pub fn evi(nir: f64, red: f64, blue: f64, params: &EviParams) -> f64 {
    EVI::new(*params, None).calculate_pixel(&[nir, red, blue])
}
