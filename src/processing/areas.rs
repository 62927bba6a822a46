// src/processing/areas.rs
//! Per-class surface area of a classified raster.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{Error, Result};

/// Square metres per hectare, inverted.
pub const HECTARES_PER_M2: f64 = 0.0001;

/// Background / nodata class, never reported.
pub const BACKGROUND_CLASS: i64 = 0;

/// Class id to human-readable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMapping {
    names: HashMap<i64, String>,
}

impl ClassMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `ID:Name` lines. Blank lines are skipped, names are trimmed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut names = HashMap::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = |reason: &str| Error::MalformedClassMapping {
                line: i + 1,
                reason: reason.to_string(),
            };

            let mut parts = line.split(':');
            let (id, name) = match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(name), None) => (id.trim(), name.trim()),
                _ => return Err(malformed("expected exactly one ':' separating id and name")),
            };
            let id: i64 = id
                .parse()
                .map_err(|_| malformed(format!("class id '{id}' is not an integer").as_str()))?;
            names.insert(id, name.to_string());
        }
        Ok(Self { names })
    }

    pub fn insert(&mut self, id: i64, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Mapped name, or `"Class <id>"` for ids without an entry.
    pub fn name(&self, id: i64) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Class {id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassArea {
    pub class_id: i64,
    pub class_name: String,
    pub pixels: u64,
    pub area_m2: f64,
    pub area_ha: f64,
    pub percentage: f64,
}

impl ClassArea {
    /// Column names, in field order.
    pub const CSV_HEADER: [&'static str; 6] = ["class_id", "class_name", "pixels", "area_m2", "area_ha", "percentage"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaReport {
    pub pixel_area_m2: f64,
    pub total_pixels: u64,
    pub total_area_m2: f64,
    pub total_area_ha: f64,
    pub classes: Vec<ClassArea>,
}

impl AreaReport {
    pub fn class(&self, id: i64) -> Option<&ClassArea> {
        self.classes.iter().find(|c| c.class_id == id)
    }

    /// Write the rows as CSV with a header line, also when no class is
    /// present.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        wtr.write_record(ClassArea::CSV_HEADER)?;
        for c in &self.classes {
            wtr.serialize(c)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Area per nonzero class for a raster with `resolution` = (x, y) metres.
///
/// Percentages are relative to the nonzero pixels only, so they sum to 100
/// whenever any class is present.
pub fn class_areas<T>(raster: ArrayView2<'_, T>, resolution: (f64, f64), mapping: &ClassMapping) -> Result<AreaReport>
where
    T: Copy + Into<i64>,
{
    let (x_res, y_res) = resolution;
    if !x_res.is_finite() || !y_res.is_finite() {
        return Err(Error::invalid(
            "resolution",
            format!("{x_res}x{y_res}"),
            "pixel size must be finite",
        ));
    }
    let pixel_area = (x_res * y_res).abs();

    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for &v in raster.iter() {
        let id: i64 = v.into();
        if id != BACKGROUND_CLASS {
            *counts.entry(id).or_insert(0) += 1;
        }
    }

    let total_pixels: u64 = counts.values().sum();
    let classes: Vec<ClassArea> = counts
        .into_iter()
        .map(|(class_id, pixels)| {
            let area_m2 = pixels as f64 * pixel_area;
            ClassArea {
                class_id,
                class_name: mapping.name(class_id),
                pixels,
                area_m2,
                area_ha: area_m2 * HECTARES_PER_M2,
                percentage: pixels as f64 / total_pixels as f64 * 100.0,
            }
        })
        .collect();

    let total_area_m2 = total_pixels as f64 * pixel_area;
    log::debug!(
        "{} classes over {} labelled pixels ({:.2} ha)",
        classes.len(),
        total_pixels,
        total_area_m2 * HECTARES_PER_M2
    );

    Ok(AreaReport {
        pixel_area_m2: pixel_area,
        total_pixels,
        total_area_m2,
        total_area_ha: total_area_m2 * HECTARES_PER_M2,
        classes,
    })
}
