// src/lib.rs
//! Remote sensing calculations: vegetation indices, GLCM texture,
//! classification agreement, per-class areas and feature selection.

pub mod batch;
pub mod cli;
pub mod error;
pub mod io;
pub mod processing;
pub mod raster;
pub mod utils;

pub use error::{Error, Result};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
