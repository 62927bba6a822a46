// src/processing/mod.rs
pub mod agreement;
pub mod areas;
pub mod indices;
pub mod selection;
pub mod signatures;
pub mod texture;

// Re-export main components
pub use agreement::{kappa, Agreement, ConfusionMatrix, KappaStrength};
pub use areas::{class_areas, AreaReport, ClassArea, ClassMapping};
pub use indices::{IndexCalculator, MaskedIndex, VegetationIndex};
pub use selection::{select_k_best, FeatureTable, ScoreFunction, SelectionNotice, SelectionReport};
pub use signatures::{vegetation_transition, IndexSummary, ReflectanceSample, Surface, SurfaceCondition};
pub use texture::{glcm_features, texture_distance, FeatureComparison, GlcmParams, TextureExtractor, TextureFeatures};
