// src/batch.rs
//! JSON batch configuration and the operations it can run.
//!
//! The CLI commands build the same operation structs, so a command line and
//! a batch entry with the same inputs produce the same report.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cli::{IndexConstants, IndexKind};
use crate::io::{self, OutputEncoding};
use crate::processing::agreement::{kappa, Agreement, KappaStrength};
use crate::processing::areas::{class_areas, AreaReport, ClassMapping};
use crate::processing::indices::{select_bands, VegetationIndex};
use crate::processing::selection::{select_k_best, SelectionReport};
use crate::processing::texture::{
    quantize_unit, FeatureComparison, GlcmParams, TextureExtractor, TextureFeatures, DEFAULT_LEVELS,
};
use crate::raster::GeoInfo;
use crate::utils::cache::FeatureCache;

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: GlobalParams,
    pub operations: Vec<Operation>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GlobalParams {
    #[serde(default)]
    pub float: bool,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: i32,
    #[serde(default = "default_levels")]
    pub levels: usize,
    /// Worker threads; all cores when unset
    #[serde(default)]
    pub jobs: Option<usize>,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            float: false,
            scale_factor: default_scale_factor(),
            levels: default_levels(),
            jobs: None,
        }
    }
}

fn default_scale_factor() -> i32 {
    10000
}

fn default_levels() -> usize {
    DEFAULT_LEVELS
}

/// One unit of work. The `type` tag selects the variant; an unknown tag is
/// rejected when the configuration is parsed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Ndvi(IndexOperation),
    Evi(IndexOperation),
    Savi(IndexOperation),
    Texture(TextureOperation),
    Kappa(KappaOperation),
    ClassAreas(AreaOperation),
    SelectFeatures(SelectionOperation),
}

/// Bands as separate files (`nir`, `red`, `blue`) or as channels of one
/// picture (`image` + `channels` ordered NIR, Red[, Blue]).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct IndexOperation {
    #[serde(default)]
    pub nir: Option<PathBuf>,
    #[serde(default)]
    pub red: Option<PathBuf>,
    #[serde(default)]
    pub blue: Option<PathBuf>,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub channels: Option<Vec<usize>>,
    #[serde(default)]
    pub params: IndexConstants,
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub float: Option<bool>,
    pub scale_factor: Option<i32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TextureOperation {
    pub image_a: PathBuf,
    pub image_b: PathBuf,
    #[serde(default)]
    pub distances: Option<Vec<usize>>,
    /// Degrees
    #[serde(default)]
    pub angles: Option<Vec<f64>>,
    pub levels: Option<usize>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct KappaOperation {
    pub truth: PathBuf,
    pub prediction: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AreaOperation {
    pub raster: PathBuf,
    /// File of `ID:Name` lines, or inline entries separated by `;`
    #[serde(default)]
    pub classes: Option<String>,
    #[serde(default)]
    pub pixel_size: Option<(f64, f64)>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SelectionOperation {
    pub table: PathBuf,
    pub target: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Summary of a whole-image index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub index: String,
    pub rows: usize,
    pub cols: usize,
    pub masked_pixels: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementReport {
    #[serde(flatten)]
    pub agreement: Agreement,
    pub strength: KappaStrength,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationReport {
    Index(IndexReport),
    Texture(FeatureComparison),
    Kappa(AgreementReport),
    ClassAreas(AreaReport),
    SelectFeatures(SelectionReport),
}

/// Shared state for a run of operations.
#[derive(Clone, Default)]
pub struct RunContext {
    pub global: GlobalParams,
    pub texture_cache: FeatureCache<TextureFeatures>,
}

impl RunContext {
    pub fn new(global: GlobalParams) -> Self {
        Self {
            global,
            texture_cache: FeatureCache::new(),
        }
    }
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Ndvi(_) => "ndvi",
            Operation::Evi(_) => "evi",
            Operation::Savi(_) => "savi",
            Operation::Texture(_) => "texture",
            Operation::Kappa(_) => "kappa",
            Operation::ClassAreas(_) => "class_areas",
            Operation::SelectFeatures(_) => "select_features",
        }
    }

    pub fn execute(&self, ctx: &RunContext) -> Result<OperationReport> {
        match self {
            Operation::Ndvi(op) => run_index(IndexKind::Ndvi, op, ctx),
            Operation::Evi(op) => run_index(IndexKind::Evi, op, ctx),
            Operation::Savi(op) => run_index(IndexKind::Savi, op, ctx),
            Operation::Texture(op) => run_texture(op, ctx),
            Operation::Kappa(op) => run_kappa(op),
            Operation::ClassAreas(op) => run_areas(op),
            Operation::SelectFeatures(op) => run_selection(op),
        }
    }
}

fn load_index_bands(index: &VegetationIndex, op: &IndexOperation) -> Result<(Vec<Array2<f64>>, Option<GeoInfo>)> {
    let required = index.required_bands();

    if let Some(image) = &op.image {
        let stack = io::load_bands(image).with_context(|| format!("reading {}", image.display()))?;
        let default_channels = [3usize, 2, 0];
        let channels = op.channels.as_deref().unwrap_or(&default_channels[..required]);
        if channels.len() != required {
            bail!("{} needs {} channel numbers, got {}", index.name(), required, channels.len());
        }
        let bands = select_bands(&stack, channels)?.into_iter().map(|b| b.to_owned()).collect();
        return Ok((bands, None));
    }

    let paths: Vec<&PathBuf> = [&op.nir, &op.red, &op.blue]
        .into_iter()
        .take(required)
        .map(|p| {
            p.as_ref()
                .ok_or_else(|| anyhow!("{} needs {} band files or an image", index.name(), band_list(required)))
        })
        .collect::<Result<_>>()?;

    let mut bands = Vec::with_capacity(required);
    let mut geo = None;
    for path in paths {
        let (band, info) = io::read_band_file(path).with_context(|| format!("reading {}", path.display()))?;
        geo = geo.or(info);
        bands.push(band);
    }
    Ok((bands, geo))
}

fn band_list(required: usize) -> &'static str {
    if required == 3 {
        "nir, red and blue"
    } else {
        "nir and red"
    }
}

fn run_index(kind: IndexKind, op: &IndexOperation, ctx: &RunContext) -> Result<OperationReport> {
    let index = kind.with_constants(&op.params);
    let (bands, geo) = load_index_bands(&index, op)?;
    let views: Vec<_> = bands.iter().map(|b| b.view()).collect();
    let result = index.compute_array(&views)?;

    if let Some(output) = &op.output {
        let encoding = OutputEncoding::new(
            op.float.unwrap_or(ctx.global.float),
            op.scale_factor.unwrap_or(ctx.global.scale_factor),
        )?;
        io::write_index_output(result.values.view(), geo.as_ref(), output, encoding, index.name())
            .with_context(|| format!("writing {}", output.display()))?;
    }

    let (rows, cols) = result.shape();
    let range = result.range();
    Ok(OperationReport::Index(IndexReport {
        index: index.name().to_string(),
        rows,
        cols,
        masked_pixels: result.masked_count(),
        mean: result.mean(),
        min: range.map(|r| r.0),
        max: range.map(|r| r.1),
        output: op.output.clone(),
    }))
}

fn run_texture(op: &TextureOperation, ctx: &RunContext) -> Result<OperationReport> {
    let params = GlcmParams {
        distances: op.distances.clone().unwrap_or_else(|| vec![1]),
        angles: op
            .angles
            .as_deref()
            .unwrap_or(&[0.0])
            .iter()
            .map(|deg| deg.to_radians())
            .collect(),
        levels: op.levels.unwrap_or(ctx.global.levels),
    };
    let extractor = TextureExtractor::with_cache(params, ctx.texture_cache.clone())?;

    let mut quantized = Vec::with_capacity(2);
    for path in [&op.image_a, &op.image_b] {
        let gray = io::load_grayscale(path).with_context(|| format!("reading {}", path.display()))?;
        quantized.push(quantize_unit(gray.view(), extractor.params().levels)?);
    }
    let comparison = extractor.compare(quantized[0].view(), quantized[1].view())?;

    let report = OperationReport::Texture(comparison);
    write_json(op.output.as_deref(), &report)?;
    Ok(report)
}

fn run_kappa(op: &KappaOperation) -> Result<OperationReport> {
    let (truth, _) = io::read_label_file(&op.truth).with_context(|| format!("reading {}", op.truth.display()))?;
    let (prediction, _) =
        io::read_label_file(&op.prediction).with_context(|| format!("reading {}", op.prediction.display()))?;
    let agreement = kappa(truth.view(), prediction.view())?;

    let strength = agreement.strength();
    let report = OperationReport::Kappa(AgreementReport {
        agreement,
        strength,
        interpretation: strength.to_string(),
    });
    write_json(op.output.as_deref(), &report)?;
    Ok(report)
}

/// Class names from a mapping file, or inline `ID:Name` entries split on `;`.
pub fn load_class_mapping(spec: Option<&str>) -> Result<ClassMapping> {
    let Some(spec) = spec else {
        return Ok(ClassMapping::new());
    };
    let path = Path::new(spec);
    let text = if path.is_file() {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        spec.replace(';', "\n")
    };
    Ok(ClassMapping::parse(&text)?)
}

fn run_areas(op: &AreaOperation) -> Result<OperationReport> {
    let (labels, geo) = io::read_label_file(&op.raster).with_context(|| format!("reading {}", op.raster.display()))?;
    let resolution = match (op.pixel_size, geo) {
        (Some(size), _) => size,
        (None, Some(info)) => info.transform.pixel_size(),
        (None, None) => bail!(
            "{} carries no georeferencing; pass the pixel size in metres",
            op.raster.display()
        ),
    };
    let mapping = load_class_mapping(op.classes.as_deref())?;
    let report = class_areas(labels.view(), resolution, &mapping)?;

    match &op.output {
        Some(path) if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            report.write_csv(BufWriter::new(file))?;
            log::info!("wrote {}", path.display());
        }
        other => write_json(other.as_deref(), &report)?,
    }
    Ok(OperationReport::ClassAreas(report))
}

fn run_selection(op: &SelectionOperation) -> Result<OperationReport> {
    let table = io::load_feature_table(&op.table).with_context(|| format!("reading {}", op.table.display()))?;
    let report = select_k_best(&table, &op.target, op.k)?;
    if let Some(notice) = report.notice {
        log::warn!("{}: {}", op.table.display(), notice);
    }
    let report = OperationReport::SelectFeatures(report);
    write_json(op.output.as_deref(), &report)?;
    Ok(report)
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    if let Some(path) = path {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

pub fn load_config(config_path: &Path) -> Result<BatchConfig> {
    let content = fs::read_to_string(config_path).with_context(|| format!("reading {}", config_path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", config_path.display()))
}

/// Run every operation on a worker pool, streaming completions back as they
/// finish. All operations run even when some fail; the first failure (in
/// configuration order) is returned afterwards.
pub fn run_batch(config: &BatchConfig) -> Result<Vec<OperationReport>> {
    let total = config.operations.len();
    let jobs = config.global.jobs.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("building worker pool")?;

    log::info!("Starting batch processing with {} operations on {} threads", total, jobs);

    let ctx = RunContext::new(config.global.clone());
    let (tx, rx) = flume::unbounded();
    for (i, op) in config.operations.iter().enumerate() {
        let tx = tx.clone();
        let ctx = ctx.clone();
        let op = op.clone();
        pool.spawn(move || {
            let result = op.execute(&ctx);
            let _ = tx.send((i, op.kind(), result));
        });
    }
    drop(tx);

    let mut results: Vec<Option<Result<OperationReport>>> = (0..total).map(|_| None).collect();
    for (done, (i, kind, result)) in rx.iter().enumerate() {
        match &result {
            Ok(_) => log::info!("[{}/{}] {} #{} done", done + 1, total, kind, i + 1),
            Err(e) => log::error!("[{}/{}] {} #{} failed: {:#}", done + 1, total, kind, i + 1, e),
        }
        results[i] = Some(result);
    }

    let mut reports = Vec::with_capacity(total);
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Some(Ok(report)) => reports.push(report),
            Some(Err(e)) => return Err(e.context(format!("operation #{} failed", i + 1))),
            None => bail!("operation #{} did not report back", i + 1),
        }
    }
    log::info!("Batch processing complete");
    Ok(reports)
}

pub fn process_batch(config_path: &Path) -> Result<Vec<OperationReport>> {
    let config = load_config(config_path)?;
    run_batch(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_operations_with_defaults() {
        let config: BatchConfig = serde_json::from_str(
            r#"{
                "operations": [
                    {"type": "savi", "nir": "n.tif", "red": "r.tif", "params": {"l": 0.3}, "float": true},
                    {"type": "kappa", "truth": "t.png", "prediction": "p.png"},
                    {"type": "class_areas", "raster": "c.png", "pixel_size": [10.0, 10.0]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.global.scale_factor, 10000);
        assert_eq!(config.global.levels, 256);
        match &config.operations[0] {
            Operation::Savi(op) => {
                assert_eq!(op.params.l, Some(0.3));
                assert_eq!(op.float, Some(true));
                assert_eq!(op.scale_factor, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(config.operations[1].kind(), "kappa");
        match &config.operations[2] {
            Operation::ClassAreas(op) => assert_eq!(op.pixel_size, Some((10.0, 10.0))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_operation_type_fails_at_parse_time() {
        let parsed: std::result::Result<BatchConfig, _> =
            serde_json::from_str(r#"{"operations": [{"type": "ndwi", "a": "x", "b": "y"}]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn inline_class_mapping() {
        let m = load_class_mapping(Some("1:Water;2:Forest")).unwrap();
        assert_eq!(m.name(2), "Forest");
        assert_eq!(load_class_mapping(None).unwrap().name(4), "Class 4");
    }

    #[test]
    fn index_without_bands_is_an_error() {
        let op = Operation::Ndvi(IndexOperation::default());
        assert!(op.execute(&RunContext::default()).is_err());
    }
}
