// src/cli.rs
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::processing::indices::{EviParams, SaviParams, VegetationIndex};

#[derive(Parser)]
#[command(name = "rsense-calc", version)]
#[command(about = "Spectral index, texture and classification-accuracy calculator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output file path (index raster, PNG rendering or CSV report)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Use float32 instead of int16 for GeoTIFF output
    #[arg(long, global = true)]
    pub float: bool,

    /// Scaling factor for fixed-point
    #[arg(long, default_value = "10000", global = true)]
    pub scale_factor: i32,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => log::LevelFilter::Error,
            (false, 0) => log::LevelFilter::Info,
            (false, 1) => log::LevelFilter::Debug,
            (false, _) => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IndexKind {
    Ndvi,
    Evi,
    Savi,
}

/// Index constants; unset values keep the usual defaults.
#[derive(Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConstants {
    /// Soil/canopy adjustment L (SAVI default 0.5, EVI default 1)
    #[arg(long = "soil-factor", short = 'l')]
    pub l: Option<f64>,

    /// EVI red aerosol coefficient (default 6)
    #[arg(long)]
    pub c1: Option<f64>,

    /// EVI blue aerosol coefficient (default 7.5)
    #[arg(long)]
    pub c2: Option<f64>,

    /// EVI gain (default 2.5)
    #[arg(long)]
    #[serde(alias = "g")]
    pub gain: Option<f64>,
}

impl IndexKind {
    pub fn with_constants(self, k: &IndexConstants) -> VegetationIndex {
        match self {
            IndexKind::Ndvi => VegetationIndex::Ndvi,
            IndexKind::Evi => {
                let d = EviParams::default();
                VegetationIndex::Evi(EviParams {
                    l: k.l.unwrap_or(d.l),
                    c1: k.c1.unwrap_or(d.c1),
                    c2: k.c2.unwrap_or(d.c2),
                    g: k.gain.unwrap_or(d.g),
                })
            }
            IndexKind::Savi => VegetationIndex::Savi(SaviParams {
                l: k.l.unwrap_or(SaviParams::default().l),
            }),
        }
    }
}

/// Band sources for a whole-image index: separate band files, or one
/// multi-channel picture with channel numbers.
#[derive(Args, Debug, Clone)]
pub struct RasterIndexArgs {
    /// NIR band file
    #[arg(long, conflicts_with = "image")]
    pub nir: Option<PathBuf>,

    /// Red band file
    #[arg(long, conflicts_with = "image")]
    pub red: Option<PathBuf>,

    /// Blue band file (EVI)
    #[arg(long, conflicts_with = "image")]
    pub blue: Option<PathBuf>,

    /// Multi-channel picture holding all bands
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// NIR channel in --image
    #[arg(long, default_value = "3")]
    pub nir_channel: usize,

    /// Red channel in --image
    #[arg(long, default_value = "2")]
    pub red_channel: usize,

    /// Blue channel in --image
    #[arg(long, default_value = "0")]
    pub blue_channel: usize,

    #[command(flatten)]
    pub constants: IndexConstants,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index value of a single pixel
    Index {
        #[arg(value_enum)]
        kind: IndexKind,

        /// NIR reflectance
        #[arg(long, allow_hyphen_values = true)]
        nir: f64,

        /// Red reflectance
        #[arg(long, allow_hyphen_values = true)]
        red: f64,

        /// Blue reflectance (EVI)
        #[arg(long, allow_hyphen_values = true)]
        blue: Option<f64>,

        #[command(flatten)]
        constants: IndexConstants,
    },

    /// Reference reflectance signatures and the healthy to bare-soil transition
    Signature {
        /// Blend factor from healthy vegetation (0) to bare soil (1)
        #[arg(long)]
        transition: Option<f64>,
    },

    /// Normalized Difference Vegetation Index: (NIR-RED)/(NIR+RED)
    Ndvi(RasterIndexArgs),

    /// Enhanced Vegetation Index
    Evi(RasterIndexArgs),

    /// Soil Adjusted Vegetation Index
    Savi(RasterIndexArgs),

    /// Compare GLCM texture descriptors of two images
    Texture {
        #[arg(long)]
        image_a: PathBuf,

        #[arg(long)]
        image_b: PathBuf,

        /// Pixel-pair distances
        #[arg(long, value_delimiter = ',', default_value = "1")]
        distances: Vec<usize>,

        /// Pair angles in degrees
        #[arg(long, value_delimiter = ',', default_value = "0")]
        angles: Vec<f64>,

        /// Gray levels
        #[arg(long, default_value = "256")]
        levels: usize,
    },

    /// Cohen's Kappa between a ground-truth and a predicted label raster
    Kappa {
        #[arg(long)]
        truth: PathBuf,

        #[arg(long)]
        prediction: PathBuf,
    },

    /// Area per class of a classified raster
    Areas {
        #[arg(long)]
        raster: PathBuf,

        /// Class names: a file of ID:Name lines, or inline entries separated by ';'
        #[arg(long)]
        classes: Option<String>,

        /// Pixel size in metres (X Y); read from the raster when georeferenced
        #[arg(long, num_args = 2, value_names = ["X", "Y"])]
        pixel_size: Option<Vec<f64>>,
    },

    /// Rank the columns of a CSV table as predictors of a target column
    Select {
        #[arg(long)]
        table: PathBuf,

        #[arg(long)]
        target: String,

        /// Number of features to keep (default: up to 10)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Run operations from a JSON configuration
    Batch {
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_areas_with_pixel_size() {
        let cli = Cli::try_parse_from([
            "rsense-calc", "areas", "--raster", "c.png", "--pixel-size", "10", "10", "-o", "out.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Areas { pixel_size, .. } => assert_eq!(pixel_size, Some(vec![10.0, 10.0])),
            _ => panic!("wrong command"),
        }
        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn index_constants_override_defaults() {
        let cli = Cli::try_parse_from(["rsense-calc", "index", "savi", "--nir", "0.5", "--red", "0.1", "-l", "0.25"])
            .unwrap();
        match cli.command {
            Commands::Index { kind, constants, .. } => {
                assert_eq!(
                    kind.with_constants(&constants),
                    VegetationIndex::Savi(SaviParams { l: 0.25 })
                );
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn verbosity_maps_to_level() {
        let cli = Cli::try_parse_from(["rsense-calc", "-vv", "signature"]).unwrap();
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
    }
}
