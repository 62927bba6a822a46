// src/processing/signatures.rs
//! Reference surface reflectance signatures and the indices they produce.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::processing::indices::{evi, ndvi, savi, EviParams};

pub const BLUE: &str = "Blue";
pub const RED: &str = "Red";
pub const NIR: &str = "NIR";

/// Approximate band centres in nanometres, for plotting a signature.
pub const BAND_WAVELENGTHS: [(&str, f64); 3] = [(BLUE, 480.0), (RED, 660.0), (NIR, 840.0)];

/// Band name to reflectance, nominally in [0, 1].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReflectanceSample {
    bands: BTreeMap<String, f64>,
}

impl ReflectanceSample {
    pub fn new<I, S>(bands: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            bands: bands.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, band: &str) -> Option<f64> {
        self.bands.get(band).copied()
    }

    fn require(&self, band: &str) -> Result<f64> {
        self.get(band)
            .ok_or_else(|| Error::invalid("band", band, "missing from reflectance sample"))
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, f64)> {
        self.bands.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Linear blend `(1 - t) * self + t * other` over the bands both share.
    pub fn interpolate(&self, other: &ReflectanceSample, t: f64) -> Result<ReflectanceSample> {
        if !(0.0..=1.0).contains(&t) {
            return Err(Error::invalid("t", t, "interpolation factor must be in [0, 1]"));
        }
        let bands = self
            .bands
            .iter()
            .filter_map(|(name, &a)| other.get(name).map(|b| (name.clone(), (1.0 - t) * a + t * b)))
            .collect();
        Ok(ReflectanceSample { bands })
    }
}

/// Reference surfaces with idealized (Blue, Red, NIR) reflectance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    HealthyVegetation,
    StressedVegetation,
    BareSoil,
    DeepWater,
}

impl Surface {
    pub const ALL: [Surface; 4] = [
        Surface::HealthyVegetation,
        Surface::StressedVegetation,
        Surface::BareSoil,
        Surface::DeepWater,
    ];

    pub fn signature(self) -> ReflectanceSample {
        let (blue, red, nir) = match self {
            Surface::HealthyVegetation => (0.05, 0.08, 0.55),
            Surface::StressedVegetation => (0.15, 0.20, 0.35),
            Surface::BareSoil => (0.10, 0.15, 0.18),
            Surface::DeepWater => (0.02, 0.01, 0.01),
        };
        ReflectanceSample::new([(BLUE, blue), (RED, red), (NIR, nir)])
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Surface::HealthyVegetation => "healthy vegetation",
            Surface::StressedVegetation => "stressed vegetation",
            Surface::BareSoil => "bare soil",
            Surface::DeepWater => "deep water",
        };
        f.write_str(s)
    }
}

/// Coarse surface reading along the healthy-canopy to bare-soil transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceCondition {
    HighVigourCanopy,
    SparseVegetation,
    BareSoil,
}

impl SurfaceCondition {
    pub fn from_transition(t: f64) -> Self {
        if t < 0.25 {
            SurfaceCondition::HighVigourCanopy
        } else if t < 0.75 {
            SurfaceCondition::SparseVegetation
        } else {
            SurfaceCondition::BareSoil
        }
    }
}

impl fmt::Display for SurfaceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SurfaceCondition::HighVigourCanopy => "high-vigour canopy",
            SurfaceCondition::SparseVegetation => "sparse or stressed vegetation",
            SurfaceCondition::BareSoil => "predominantly bare soil",
        };
        f.write_str(s)
    }
}

/// Soil factor used for the SAVI column of an [`IndexSummary`].
pub const SUMMARY_SAVI_L: f64 = 0.5;

/// NDVI, EVI and SAVI of one reflectance sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexSummary {
    pub ndvi: f64,
    pub evi: f64,
    pub savi: f64,
}

impl IndexSummary {
    pub fn from_sample(sample: &ReflectanceSample) -> Result<Self> {
        let nir = sample.require(NIR)?;
        let red = sample.require(RED)?;
        let blue = sample.require(BLUE)?;
        Ok(Self {
            ndvi: ndvi(nir, red),
            evi: evi(nir, red, blue, &EviParams::default()),
            savi: savi(nir, red, SUMMARY_SAVI_L),
        })
    }
}

/// Blend healthy vegetation towards bare soil by `t` and summarize it.
pub fn vegetation_transition(t: f64) -> Result<(ReflectanceSample, SurfaceCondition, IndexSummary)> {
    let sample = Surface::HealthyVegetation
        .signature()
        .interpolate(&Surface::BareSoil.signature(), t)?;
    let summary = IndexSummary::from_sample(&sample)?;
    Ok((sample, SurfaceCondition::from_transition(t), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn healthy_vegetation_indices() {
        let summary = IndexSummary::from_sample(&Surface::HealthyVegetation.signature()).unwrap();
        assert_relative_eq!(summary.ndvi, 0.47 / 0.63, epsilon = 1e-12);
        assert_relative_eq!(summary.savi, 0.47 / 1.13 * 1.5, epsilon = 1e-12);
        // 2.5 * 0.47 / (0.55 + 0.48 - 0.375 + 1)
        assert_relative_eq!(summary.evi, 1.175 / 1.655, epsilon = 1e-12);
    }

    #[test]
    fn transition_endpoints_match_references() {
        let (start, cond, _) = vegetation_transition(0.0).unwrap();
        assert_eq!(start, Surface::HealthyVegetation.signature());
        assert_eq!(cond, SurfaceCondition::HighVigourCanopy);

        let (end, cond, _) = vegetation_transition(1.0).unwrap();
        for (band, v) in end.bands() {
            assert_relative_eq!(v, Surface::BareSoil.signature().get(band).unwrap(), epsilon = 1e-12);
        }
        assert_eq!(cond, SurfaceCondition::BareSoil);
    }

    #[test]
    fn transition_midpoint_is_sparse() {
        let (sample, cond, _) = vegetation_transition(0.5).unwrap();
        assert_relative_eq!(sample.get(NIR).unwrap(), 0.365, epsilon = 1e-12);
        assert_eq!(cond, SurfaceCondition::SparseVegetation);
    }

    #[test]
    fn factor_outside_unit_interval_is_rejected() {
        assert!(vegetation_transition(1.5).is_err());
        assert!(vegetation_transition(-0.1).is_err());
    }

    #[test]
    fn missing_band_is_an_error() {
        let sample = ReflectanceSample::new([(NIR, 0.4), (RED, 0.1)]);
        assert!(IndexSummary::from_sample(&sample).is_err());
    }
}
