// src/processing/indices/mod.rs
//! Band-ratio vegetation indices.
//!
//! Every index is a ratio `numerator / denominator` of per-pixel band
//! reflectances. Whole-image calculation builds the invalid-denominator
//! mask first and only divides the unmasked pixels, so a zero or
//! non-finite denominator never aborts the computation.

pub mod evi;
pub mod masked;
pub mod ndvi;
pub mod savi;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_shape, Error, Result};

pub use evi::{evi, EviParams, EVI};
pub use masked::MaskedIndex;
pub use ndvi::{ndvi, NDVI};
pub use savi::{savi, SaviParams, SAVI};

/// Largest band count any index in this module consumes.
const MAX_BANDS: usize = 3;

/// Common contract of the index calculators.
///
/// `bands` is always ordered as the calculator documents it (NIR first) and
/// holds exactly `required_bands()` values.
pub trait IndexCalculator: Sync {
    fn name(&self) -> &str;

    fn required_bands(&self) -> usize;

    fn numerator(&self, bands: &[f64]) -> f64;

    fn denominator(&self, bands: &[f64]) -> f64;

    /// Single-pixel value; NaN when the denominator is masked.
    fn calculate_pixel(&self, bands: &[f64]) -> f64 {
        let denominator = self.denominator(bands);
        if is_masked(denominator) {
            return f64::NAN;
        }
        self.numerator(bands) / denominator
    }

    /// Whole-image value with per-pixel masking.
    fn calculate(&self, inputs: &[ArrayView2<'_, f64>]) -> Result<MaskedIndex> {
        calculate_masked(self, inputs)
    }
}

/// Masking policy shared by scalar and array calculators.
#[inline]
pub fn is_masked(denominator: f64) -> bool {
    denominator == 0.0 || !denominator.is_finite()
}

fn calculate_masked<C: IndexCalculator + ?Sized>(
    calculator: &C,
    inputs: &[ArrayView2<'_, f64>],
) -> Result<MaskedIndex> {
    let required = calculator.required_bands();
    if inputs.len() != required {
        return Err(Error::BandCount {
            expected: required,
            actual: inputs.len(),
        });
    }

    let shape = inputs[0].dim();
    for band in &inputs[1..] {
        check_shape(shape, band.dim())?;
    }

    let bands: Vec<_> = inputs.iter().map(|b| b.as_standard_layout()).collect();
    let slices = bands
        .iter()
        .map(|b| {
            b.as_slice()
                .ok_or_else(|| Error::Unsupported("non-contiguous band buffer".into()))
        })
        .collect::<Result<Vec<&[f64]>>>()?;

    let gather = |i: usize| {
        let mut pixel = [0.0f64; MAX_BANDS];
        for (dst, band) in pixel.iter_mut().zip(&slices) {
            *dst = band[i];
        }
        pixel
    };

    let len = shape.0 * shape.1;

    // Mask first, then divide only where the denominator is usable
    let mask: Vec<bool> = (0..len)
        .into_par_iter()
        .map(|i| is_masked(calculator.denominator(&gather(i)[..required])))
        .collect();

    let values: Vec<f64> = mask
        .par_iter()
        .enumerate()
        .map(|(i, &masked)| {
            if masked {
                return f64::NAN;
            }
            let pixel = gather(i);
            let pixel = &pixel[..required];
            calculator.numerator(pixel) / calculator.denominator(pixel)
        })
        .collect();

    let masked_count = mask.iter().filter(|&&m| m).count();
    log::debug!(
        "{}: {} pixels, {} masked at zero denominator",
        calculator.name(),
        len,
        masked_count
    );

    MaskedIndex::from_parts(shape, values, mask)
}

/// Enumerated index kinds, each carrying its own validated constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "index", rename_all = "lowercase")]
pub enum VegetationIndex {
    Ndvi,
    Evi(EviParams),
    Savi(SaviParams),
}

impl VegetationIndex {
    /// Reject constants that would make the formula meaningless.
    pub fn validate(&self) -> Result<()> {
        match self {
            VegetationIndex::Ndvi => Ok(()),
            VegetationIndex::Evi(p) => p.validate(),
            VegetationIndex::Savi(p) => p.validate(),
        }
    }

    /// Build a validated calculator.
    pub fn calculator(&self) -> Result<Box<dyn IndexCalculator + Send>> {
        self.validate()?;
        Ok(match *self {
            VegetationIndex::Ndvi => Box::new(NDVI::new(None)),
            VegetationIndex::Evi(params) => Box::new(EVI::new(params, None)),
            VegetationIndex::Savi(params) => Box::new(SAVI::new(params, None)),
        })
    }

    pub fn required_bands(&self) -> usize {
        match self {
            VegetationIndex::Evi(_) => 3,
            _ => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "NDVI",
            VegetationIndex::Evi(_) => "EVI",
            VegetationIndex::Savi(_) => "SAVI",
        }
    }

    /// Scalar calculation; bands ordered NIR, Red[, Blue].
    pub fn compute_scalar(&self, bands: &[f64]) -> Result<f64> {
        let calculator = self.calculator()?;
        if bands.len() != calculator.required_bands() {
            return Err(Error::BandCount {
                expected: calculator.required_bands(),
                actual: bands.len(),
            });
        }
        Ok(calculator.calculate_pixel(bands))
    }

    /// Array calculation; bands ordered NIR, Red[, Blue].
    pub fn compute_array(&self, bands: &[ArrayView2<'_, f64>]) -> Result<MaskedIndex> {
        self.calculator()?.calculate(bands)
    }
}

/// Split a multi-channel picture into the bands an index needs.
///
/// `channels` indexes into `stack`; the order of `channels` is the band
/// order the index expects.
pub fn select_bands<'a>(stack: &'a [Array2<f64>], channels: &[usize]) -> Result<Vec<ArrayView2<'a, f64>>> {
    channels
        .iter()
        .map(|&c| {
            stack.get(c).map(|b| b.view()).ok_or(Error::BandCount {
                expected: c + 1,
                actual: stack.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn variant_serde_uses_defaults() {
        let index: VegetationIndex = serde_json::from_str(r#"{"index":"savi"}"#).unwrap();
        assert_eq!(index, VegetationIndex::Savi(SaviParams::default()));

        let index: VegetationIndex =
            serde_json::from_str(r#"{"index":"evi","g":2.0}"#).unwrap();
        match index {
            VegetationIndex::Evi(p) => {
                assert_eq!(p.g, 2.0);
                assert_eq!(p.c1, 6.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn band_count_is_checked() {
        let a = array![[0.5, 0.4]];
        let err = VegetationIndex::Ndvi.compute_array(&[a.view()]).unwrap_err();
        assert!(matches!(err, Error::BandCount { expected: 2, actual: 1 }));
        assert!(VegetationIndex::Ndvi.compute_scalar(&[0.5]).is_err());
    }

    #[test]
    fn select_bands_picks_channels() {
        let stack = vec![
            Array2::from_elem((1, 1), 0.0),
            Array2::from_elem((1, 1), 1.0),
            Array2::from_elem((1, 1), 2.0),
        ];
        let picked = select_bands(&stack, &[2, 0]).unwrap();
        assert_eq!(picked[0][[0, 0]], 2.0);
        assert_eq!(picked[1][[0, 0]], 0.0);
        assert!(select_bands(&stack, &[3]).is_err());
    }
}
