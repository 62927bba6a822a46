// src/error.rs
use thiserror::Error;

/// Error type for every fallible calculation and I/O helper in the crate.
///
/// Zero denominators in index formulas are not errors; they are masked.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Wrong band count: expected {expected}, got {actual}")]
    BandCount { expected: usize, actual: usize },

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Gray level {value} outside quantization range 0..{levels}")]
    GrayLevelOutOfRange { value: f64, levels: usize },

    #[error("Malformed class mapping at line {line}: {reason}")]
    MalformedClassMapping { line: usize, reason: String },

    #[error("Malformed table: {0}")]
    MalformedTable(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Fail fast when two rasters do not share a shape.
pub(crate) fn check_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch { expected, actual });
    }
    Ok(())
}
