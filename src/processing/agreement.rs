// src/processing/agreement.rs
//! Agreement between a ground-truth and a predicted label raster.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::error::{check_shape, Error, Result};

/// Cohen's Kappa together with the raw pixel agreement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Agreement {
    pub kappa: f64,
    pub observed_agreement: f64,
    pub expected_agreement: f64,
}

impl Agreement {
    pub fn strength(&self) -> KappaStrength {
        KappaStrength::from_kappa(self.kappa)
    }
}

/// Landis & Koch style reading of κ; upper bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KappaStrength {
    Poor,
    Slight,
    Fair,
    Moderate,
    Substantial,
    AlmostPerfect,
}

impl KappaStrength {
    /// Band of a κ value; NaN is treated as no agreement.
    pub fn from_kappa(kappa: f64) -> Self {
        match kappa {
            k if k.is_nan() || k < 0.0 => KappaStrength::Poor,
            k if k <= 0.20 => KappaStrength::Slight,
            k if k <= 0.40 => KappaStrength::Fair,
            k if k <= 0.60 => KappaStrength::Moderate,
            k if k <= 0.80 => KappaStrength::Substantial,
            _ => KappaStrength::AlmostPerfect,
        }
    }
}

impl fmt::Display for KappaStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KappaStrength::Poor => "poor agreement (worse than chance)",
            KappaStrength::Slight => "slight agreement",
            KappaStrength::Fair => "fair agreement",
            KappaStrength::Moderate => "moderate agreement",
            KappaStrength::Substantial => "substantial agreement",
            KappaStrength::AlmostPerfect => "almost perfect agreement",
        };
        f.write_str(s)
    }
}

/// Pixel-pair counts; rows are ground-truth labels, columns predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix<L> {
    labels: Vec<L>,
    counts: Array2<u64>,
}

impl<L: Copy + Ord + Hash> ConfusionMatrix<L> {
    /// Tabulate two label rasters of identical shape.
    pub fn from_rasters(truth: ArrayView2<'_, L>, prediction: ArrayView2<'_, L>) -> Result<Self> {
        check_shape(truth.dim(), prediction.dim())?;
        if truth.is_empty() {
            return Err(Error::EmptyInput("label raster"));
        }

        let index: BTreeMap<L, usize> = truth
            .iter()
            .chain(prediction.iter())
            .copied()
            .collect::<std::collections::BTreeSet<L>>()
            .into_iter()
            .enumerate()
            .map(|(i, l)| (l, i))
            .collect();

        let n = index.len();
        let mut counts = Array2::<u64>::zeros((n, n));
        for (t, p) in truth.iter().zip(prediction.iter()) {
            counts[[index[t], index[p]]] += 1;
        }

        Ok(Self {
            labels: index.into_keys().collect(),
            counts,
        })
    }

    /// Sorted union of the labels found in both rasters
    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Fraction of pixels on the diagonal.
    pub fn observed_agreement(&self) -> f64 {
        self.counts.diag().sum() as f64 / self.total() as f64
    }

    /// Chance agreement from the row and column marginals.
    pub fn expected_agreement(&self) -> f64 {
        let n = self.total() as f64;
        let rows = self.counts.sum_axis(ndarray::Axis(1));
        let cols = self.counts.sum_axis(ndarray::Axis(0));
        rows.iter()
            .zip(cols.iter())
            .map(|(&r, &c)| (r as f64 / n) * (c as f64 / n))
            .sum()
    }

    pub fn agreement(&self) -> Agreement {
        let p_o = self.observed_agreement();
        let p_e = self.expected_agreement();
        // Both rasters hold a single identical label: perfect by definition
        let kappa = if (1.0 - p_e).abs() < f64::EPSILON {
            1.0
        } else {
            (p_o - p_e) / (1.0 - p_e)
        };
        Agreement {
            kappa,
            observed_agreement: p_o,
            expected_agreement: p_e,
        }
    }
}

/// Cohen's Kappa and observed agreement of two equal-shape label rasters.
///
/// Fails with [`Error::ShapeMismatch`] before anything is counted when the
/// shapes differ.
pub fn kappa<L: Copy + Ord + Hash>(truth: ArrayView2<'_, L>, prediction: ArrayView2<'_, L>) -> Result<Agreement> {
    let matrix = ConfusionMatrix::from_rasters(truth, prediction)?;
    let agreement = matrix.agreement();
    log::debug!(
        "kappa over {} pixels, {} labels: {:.4} (p_o {:.4}, p_e {:.4})",
        matrix.total(),
        matrix.labels().len(),
        agreement.kappa,
        agreement.observed_agreement,
        agreement.expected_agreement
    );
    Ok(agreement)
}
