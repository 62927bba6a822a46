// src/processing/indices/masked.rs
use ndarray::Array2;
use crate::error::{Error, Result};

/// Index values plus the explicit mask of pixels whose denominator was
/// zero or non-finite.
///
/// Masked pixels hold `NaN` in `values` and `true` in `mask`; every other
/// pixel holds the formula result.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedIndex {
    pub values: Array2<f64>,
    pub mask: Array2<bool>,
}

impl MaskedIndex {
    pub(crate) fn from_parts(shape: (usize, usize), values: Vec<f64>, mask: Vec<bool>) -> Result<Self> {
        let values = Array2::from_shape_vec(shape, values)
            .map_err(|e| Error::Unsupported(e.to_string()))?;
        let mask = Array2::from_shape_vec(shape, mask)
            .map_err(|e| Error::Unsupported(e.to_string()))?;
        Ok(Self { values, mask })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Values of the unmasked pixels in row-major order
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, m)| !**m)
            .map(|(&v, _)| v)
    }

    /// Mean over unmasked pixels, `None` when everything is masked.
    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .valid_values()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// (min, max) over unmasked pixels.
    pub fn range(&self) -> Option<(f64, f64)> {
        use itertools::{Itertools, MinMaxResult};
        match self
            .valid_values()
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(v) => Some((v, v)),
            MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
        }
    }
}
