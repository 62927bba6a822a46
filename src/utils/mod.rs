// src/utils/mod.rs
pub mod cache;
pub mod scaling;
pub mod special;

pub use cache::{FeatureCache, Fingerprint};
pub use scaling::{to_display_u8, to_fixed_point, to_float_nodata, FIXED_POINT_NODATA, FLOAT_NODATA, MAX_SCALE_FACTOR};
