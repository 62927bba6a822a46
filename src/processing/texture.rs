// src/processing/texture.rs
//! Gray-level co-occurrence matrix (GLCM) texture descriptors.
//!
//! One symmetric, normalized GLCM is built per (distance, angle) pair over
//! the whole image. Contrast, correlation, energy and homogeneity are
//! derived from each matrix and averaged across pairs.

use itertools::iproduct;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::cache::{FeatureCache, Fingerprint};

pub const DEFAULT_LEVELS: usize = 256;
pub const MAX_LEVELS: usize = 4096;

/// Offsets and quantization for GLCM construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlcmParams {
    /// Pixel-pair distances (>= 1)
    pub distances: Vec<usize>,
    /// Angles in radians; 0 pairs a pixel with its right-hand neighbour
    pub angles: Vec<f64>,
    /// Number of gray levels
    pub levels: usize,
}

impl Default for GlcmParams {
    fn default() -> Self {
        Self {
            distances: vec![1],
            angles: vec![0.0],
            levels: DEFAULT_LEVELS,
        }
    }
}

impl GlcmParams {
    pub fn validate(&self) -> Result<()> {
        validate_levels(self.levels)?;
        if self.distances.is_empty() {
            return Err(Error::EmptyInput("GLCM distance list"));
        }
        if self.angles.is_empty() {
            return Err(Error::EmptyInput("GLCM angle list"));
        }
        if let Some(&d) = self.distances.iter().find(|&&d| d == 0) {
            return Err(Error::invalid("distance", d, "must be >= 1"));
        }
        if let Some(&a) = self.angles.iter().find(|a| !a.is_finite()) {
            return Err(Error::invalid("angle", a, "must be finite"));
        }
        Ok(())
    }

    fn fingerprint(&self, image: ArrayView2<'_, u16>) -> Fingerprint {
        Fingerprint::builder()
            .array(image)
            .usizes(&self.distances)
            .floats(&self.angles)
            .usizes(&[self.levels])
            .finish()
    }
}

fn validate_levels(levels: usize) -> Result<()> {
    if !(2..=MAX_LEVELS).contains(&levels) {
        return Err(Error::invalid(
            "levels",
            levels,
            format!("must be in 2..={MAX_LEVELS}"),
        ));
    }
    Ok(())
}

/// Quantize a float image in [0, 1] to `levels` integer gray levels by
/// scaling with `levels - 1` and truncating.
pub fn quantize_unit(image: ArrayView2<'_, f64>, levels: usize) -> Result<Array2<u16>> {
    validate_levels(levels)?;
    if let Some(&bad) = image.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(Error::GrayLevelOutOfRange { value: bad, levels });
    }
    let scale = (levels - 1) as f64;
    Ok(image.mapv(|v| (v * scale) as u16))
}

fn check_gray_levels(image: ArrayView2<'_, u16>, levels: usize) -> Result<()> {
    if let Some(&bad) = image.iter().find(|&&v| v as usize >= levels) {
        return Err(Error::GrayLevelOutOfRange {
            value: bad as f64,
            levels,
        });
    }
    Ok(())
}

/// Symmetric, normalized co-occurrence matrix for one offset.
#[derive(Debug, Clone)]
pub struct Glcm {
    distance: usize,
    angle: f64,
    matrix: Array2<f64>,
}

impl Glcm {
    /// Build the matrix for `image` (values already in `0..levels`).
    pub fn new(image: ArrayView2<'_, u16>, distance: usize, angle: f64, levels: usize) -> Result<Self> {
        validate_levels(levels)?;
        check_gray_levels(image, levels)?;
        Self::build(image, distance, angle, levels)
    }

    fn build(image: ArrayView2<'_, u16>, distance: usize, angle: f64, levels: usize) -> Result<Self> {
        let (rows, cols) = image.dim();
        let d_row = (angle.sin() * distance as f64).round() as isize;
        let d_col = (angle.cos() * distance as f64).round() as isize;

        let (rows_i, cols_i) = (rows as isize, cols as isize);
        let row_range = (-d_row).max(0)..rows_i.min(rows_i - d_row);
        let col_range = (-d_col).max(0)..cols_i.min(cols_i - d_col);

        let mut counts = Array2::<u64>::zeros((levels, levels));
        let mut pairs: u64 = 0;
        for r in row_range {
            for c in col_range.clone() {
                let i = image[[r as usize, c as usize]] as usize;
                let j = image[[(r + d_row) as usize, (c + d_col) as usize]] as usize;
                counts[[i, j]] += 1;
                pairs += 1;
            }
        }

        if pairs == 0 {
            return Err(Error::invalid(
                "distance",
                distance,
                format!("no pixel pairs at angle {angle:.4} in a {rows}x{cols} image"),
            ));
        }

        // P + P^T, then normalize to sum 1
        let total = (2 * pairs) as f64;
        let counts_t = counts.t();
        let matrix = Array2::from_shape_fn((levels, levels), |(i, j)| {
            (counts[[i, j]] + counts_t[[i, j]]) as f64 / total
        });

        Ok(Self {
            distance,
            angle,
            matrix,
        })
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    fn weighted_sum(&self, weight: impl Fn(f64, f64) -> f64) -> f64 {
        self.matrix
            .indexed_iter()
            .filter(|(_, p)| **p > 0.0)
            .map(|((i, j), &p)| p * weight(i as f64, j as f64))
            .sum()
    }

    /// Σ P(i,j) (i - j)²
    pub fn contrast(&self) -> f64 {
        self.weighted_sum(|i, j| (i - j).powi(2))
    }

    /// Σ P(i,j) / (1 + (i - j)²)
    pub fn homogeneity(&self) -> f64 {
        self.weighted_sum(|i, j| 1.0 / (1.0 + (i - j).powi(2)))
    }

    /// √(Σ P(i,j)²)
    pub fn energy(&self) -> f64 {
        self.matrix.iter().map(|p| p * p).sum::<f64>().sqrt()
    }

    /// Gray-level linear dependency; 1 when either marginal has no spread.
    pub fn correlation(&self) -> f64 {
        let mu_i = self.weighted_sum(|i, _| i);
        let mu_j = self.weighted_sum(|_, j| j);
        let sigma_i = self.weighted_sum(|i, _| (i - mu_i).powi(2)).sqrt();
        let sigma_j = self.weighted_sum(|_, j| (j - mu_j).powi(2)).sqrt();

        if sigma_i < 1e-15 || sigma_j < 1e-15 {
            return 1.0;
        }

        self.weighted_sum(|i, j| (i - mu_i) * (j - mu_j)) / (sigma_i * sigma_j)
    }

    pub fn features(&self) -> TextureFeatures {
        TextureFeatures {
            contrast: self.contrast(),
            correlation: self.correlation(),
            energy: self.energy(),
            homogeneity: self.homogeneity(),
        }
    }
}

/// The four Haralick descriptors reported for an image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureFeatures {
    pub contrast: f64,
    pub correlation: f64,
    pub energy: f64,
    pub homogeneity: f64,
}

impl TextureFeatures {
    pub const NAMES: [&'static str; 4] = ["Contrast", "Correlation", "Energy", "Homogeneity"];

    pub fn as_array(&self) -> [f64; 4] {
        [self.contrast, self.correlation, self.energy, self.homogeneity]
    }

    fn from_array(v: [f64; 4]) -> Self {
        Self {
            contrast: v[0],
            correlation: v[1],
            energy: v[2],
            homogeneity: v[3],
        }
    }

    /// (name, value) pairs in reporting order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        Self::NAMES.into_iter().zip(self.as_array())
    }

    /// Euclidean distance over the 4-tuple; lower means more similar.
    pub fn distance(&self, other: &TextureFeatures) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn abs_diff(&self, other: &TextureFeatures) -> Self {
        let (a, b) = (self.as_array(), other.as_array());
        Self::from_array([0usize, 1, 2, 3].map(|k| (a[k] - b[k]).abs()))
    }

    fn mean<'a>(items: impl ExactSizeIterator<Item = &'a TextureFeatures>) -> Self {
        let n = items.len().max(1) as f64;
        let mut sum = [0.0; 4];
        for f in items {
            for (s, v) in sum.iter_mut().zip(f.as_array()) {
                *s += v;
            }
        }
        Self::from_array(sum.map(|s| s / n))
    }
}

/// Descriptors of a single (distance, angle) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairFeatures {
    pub distance: usize,
    pub angle: f64,
    pub features: TextureFeatures,
}

/// Descriptors for every (distance, angle) pair, distance-major.
pub fn glcm_feature_grid(image: ArrayView2<'_, u16>, params: &GlcmParams) -> Result<Vec<PairFeatures>> {
    params.validate()?;
    check_gray_levels(image, params.levels)?;

    let pairs: Vec<(usize, f64)> = iproduct!(params.distances.iter().copied(), params.angles.iter().copied()).collect();

    pairs
        .into_par_iter()
        .map(|(distance, angle)| {
            let glcm = Glcm::build(image, distance, angle, params.levels)?;
            Ok(PairFeatures {
                distance,
                angle,
                features: glcm.features(),
            })
        })
        .collect()
}

/// Descriptors averaged over all (distance, angle) pairs.
pub fn glcm_features(image: ArrayView2<'_, u16>, params: &GlcmParams) -> Result<TextureFeatures> {
    let grid = glcm_feature_grid(image, params)?;
    let mean = TextureFeatures::mean(grid.iter().map(|p| &p.features));
    log::debug!(
        "GLCM {}x{} image, {} offset pairs, {} levels: {:?}",
        image.nrows(),
        image.ncols(),
        grid.len(),
        params.levels,
        mean
    );
    Ok(mean)
}

/// Euclidean distance between two descriptor vectors.
pub fn texture_distance(a: &TextureFeatures, b: &TextureFeatures) -> f64 {
    a.distance(b)
}

/// Side-by-side comparison of two images' textures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureComparison {
    pub first: TextureFeatures,
    pub second: TextureFeatures,
    /// Per-descriptor absolute difference
    pub differences: TextureFeatures,
    pub distance: f64,
}

impl FeatureComparison {
    pub fn new(first: TextureFeatures, second: TextureFeatures) -> Self {
        Self {
            first,
            second,
            differences: first.abs_diff(&second),
            distance: first.distance(&second),
        }
    }
}

/// Texture extraction with one shared set of quantization parameters and
/// a caller-owned result cache.
pub struct TextureExtractor {
    params: GlcmParams,
    cache: FeatureCache<TextureFeatures>,
}

impl TextureExtractor {
    pub fn new(params: GlcmParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            cache: FeatureCache::new(),
        })
    }

    /// Share an existing cache, e.g. across batch operations.
    pub fn with_cache(params: GlcmParams, cache: FeatureCache<TextureFeatures>) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, cache })
    }

    pub fn params(&self) -> &GlcmParams {
        &self.params
    }

    pub fn cache(&self) -> &FeatureCache<TextureFeatures> {
        &self.cache
    }

    pub fn features(&self, image: ArrayView2<'_, u16>) -> Result<TextureFeatures> {
        let key = self.params.fingerprint(image);
        self.cache
            .get_or_try_insert_with(key, || glcm_features(image, &self.params))
    }

    /// Quantize a [0, 1] image with this extractor's level count first.
    pub fn features_unit(&self, image: ArrayView2<'_, f64>) -> Result<TextureFeatures> {
        let quantized = quantize_unit(image, self.params.levels)?;
        self.features(quantized.view())
    }

    pub fn compare(&self, a: ArrayView2<'_, u16>, b: ArrayView2<'_, u16>) -> Result<FeatureComparison> {
        Ok(FeatureComparison::new(self.features(a)?, self.features(b)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::f64::consts::FRAC_PI_2;

    fn params(levels: usize) -> GlcmParams {
        GlcmParams {
            levels,
            ..Default::default()
        }
    }

    #[test]
    fn matrix_is_symmetric_and_normalized() {
        let img = array![[0u16, 0, 1, 1], [0, 0, 1, 1], [0, 2, 2, 2], [2, 2, 3, 3]];
        let glcm = Glcm::new(img.view(), 1, 0.0, 4).unwrap();
        let m = glcm.matrix();
        assert_relative_eq!(m.sum(), 1.0, epsilon = 1e-12);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(m[[i, j]], m[[j, i]]);
            }
        }
        // Horizontal counts: (0,0)=2 (0,1)=2 (1,1)=2 (0,2)=1 (2,2)=3 (2,3)=1 (3,3)=1 over 12 pairs
        assert_relative_eq!(m[[0, 0]], 4.0 / 24.0, epsilon = 1e-12);
        assert_relative_eq!(m[[0, 1]], 2.0 / 24.0, epsilon = 1e-12);
        assert_relative_eq!(m[[2, 2]], 6.0 / 24.0, epsilon = 1e-12);
    }

    #[test]
    fn vertical_angle_pairs_rows() {
        let img = array![[0u16, 0], [1, 1]];
        let glcm = Glcm::new(img.view(), 1, FRAC_PI_2, 2).unwrap();
        // Only (0,1) pairs, symmetrized
        assert_relative_eq!(glcm.matrix()[[0, 1]], 0.5, epsilon = 1e-12);
        assert_relative_eq!(glcm.matrix()[[1, 0]], 0.5, epsilon = 1e-12);
        assert_relative_eq!(glcm.contrast(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn uniform_image_descriptors() {
        let img = Array2::from_elem((8, 8), 37u16);
        let f = glcm_features(img.view(), &params(256)).unwrap();
        assert_relative_eq!(f.energy, 1.0, epsilon = 1e-12);
        assert_relative_eq!(f.contrast, 0.0, epsilon = 1e-12);
        assert_relative_eq!(f.homogeneity, 1.0, epsilon = 1e-12);
        assert_relative_eq!(f.correlation, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn checkerboard_has_high_contrast_and_negative_correlation() {
        let img = Array2::from_shape_fn((6, 6), |(r, c)| if (r + c) % 2 == 0 { 0u16 } else { 3 });
        let f = glcm_features(img.view(), &params(4)).unwrap();
        assert_relative_eq!(f.contrast, 9.0, epsilon = 1e-12);
        assert_relative_eq!(f.correlation, -1.0, epsilon = 1e-12);
        assert_relative_eq!(f.homogeneity, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn out_of_range_levels_rejected() {
        let img = array![[0u16, 4]];
        assert!(matches!(
            glcm_features(img.view(), &params(4)),
            Err(Error::GrayLevelOutOfRange { .. })
        ));
        assert!(quantize_unit(array![[1.2]].view(), 256).is_err());
        assert!(glcm_features(img.view(), &params(1)).is_err());
    }

    #[test]
    fn offset_larger_than_image_is_rejected() {
        let img = array![[0u16, 1]];
        let p = GlcmParams {
            distances: vec![3],
            levels: 2,
            ..Default::default()
        };
        assert!(glcm_features(img.view(), &p).is_err());
    }

    #[test]
    fn quantize_truncates() {
        let q = quantize_unit(array![[0.0, 0.5, 1.0]].view(), 256).unwrap();
        assert_eq!(q, array![[0u16, 127, 255]]);
    }

    #[test]
    fn grid_averages_into_mean() {
        let img = Array2::from_shape_fn((5, 5), |(r, c)| ((r * 5 + c) % 4) as u16);
        let p = GlcmParams {
            distances: vec![1, 2],
            angles: vec![0.0, FRAC_PI_2],
            levels: 4,
        };
        let grid = glcm_feature_grid(img.view(), &p).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!((grid[1].distance, grid[1].angle), (1, FRAC_PI_2));
        let mean = glcm_features(img.view(), &p).unwrap();
        let expected: f64 = grid.iter().map(|g| g.features.contrast).sum::<f64>() / 4.0;
        assert_relative_eq!(mean.contrast, expected, epsilon = 1e-12);
    }

    #[test]
    fn extractor_caches_by_content() {
        let extractor = TextureExtractor::new(params(4)).unwrap();
        let a = array![[0u16, 1, 2], [3, 2, 1]];
        let cmp = extractor.compare(a.view(), a.view()).unwrap();
        assert_eq!(extractor.cache().len(), 1);
        assert_eq!(cmp.distance, 0.0);
        assert_eq!(cmp.differences, TextureFeatures::default());
    }
}
