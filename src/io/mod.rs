// src/io/mod.rs
pub mod files;
pub mod image;
#[cfg(feature = "gdal")]
pub mod raster;
pub mod table;

pub use self::image::{load_bands, load_grayscale, load_labels, save_display, save_gray};
pub use files::{read_band_file, read_label_file, write_index_output, OutputEncoding};
#[cfg(feature = "gdal")]
pub use raster::{read_band, read_labels, write_index};
pub use table::{load_feature_table, parse_csv, read_csv, Records};
