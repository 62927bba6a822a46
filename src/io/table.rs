// src/io/table.rs
//! Comma-separated tables: a header row, then records.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::error::{Error, Result};
use crate::processing::selection::FeatureTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Records {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn read_records<R: Read>(reader: R) -> Result<Records> {
    // Ragged rows are reported by `FeatureTable::from_records` with row numbers
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(Error::EmptyInput("csv header"));
    }

    let rows = rdr
        .records()
        .map(|record| Ok(record?.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>>>()?;
    Ok(Records { headers, rows })
}

pub fn parse_csv(text: &str) -> Result<Records> {
    read_records(text.as_bytes())
}

pub fn read_csv(path: &Path) -> Result<Records> {
    read_records(std::fs::File::open(path)?)
}

pub fn load_feature_table(path: &Path) -> Result<FeatureTable> {
    let records = read_csv(path)?;
    log::debug!(
        "{}: {} columns, {} rows",
        path.display(),
        records.headers.len(),
        records.rows.len()
    );
    FeatureTable::from_records(records.headers, &records.rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_fields() {
        let r = parse_csv("a,b\n1,\"x, \"\"y\"\"\"\n\n2,z\r\n").unwrap();
        assert_eq!(r.headers, vec!["a", "b"]);
        assert_eq!(r.rows, vec![vec!["1", "x, \"y\""], vec!["2", "z"]]);
    }

    #[test]
    fn quoted_line_break_stays_in_one_field() {
        let r = parse_csv("id,name\n1,\"Wet\nland\"\n2,Forest\n").unwrap();
        assert_eq!(r.rows, vec![vec!["1", "Wet\nland"], vec!["2", "Forest"]]);
    }

    #[test]
    fn empty_text_has_no_header() {
        assert!(matches!(parse_csv("\n\n"), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn headers_are_trimmed() {
        let r = parse_csv(" ndvi , class \n0.5,1\n").unwrap();
        assert_eq!(r.headers, vec!["ndvi", "class"]);
    }

    #[test]
    fn reads_written_class_area_report() {
        use crate::processing::areas::{class_areas, ClassMapping};
        use ndarray::array;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.csv");
        let mut mapping = ClassMapping::new();
        mapping.insert(1, "Wet\nland, \"coastal\"");
        let report = class_areas(array![[1u8, 1, 2]].view(), (10.0, 10.0), &mapping).unwrap();
        report.write_csv(std::fs::File::create(&path).unwrap()).unwrap();

        let r = read_csv(&path).unwrap();
        assert_eq!(r.headers[..2], ["class_id", "class_name"]);
        assert_eq!(r.rows.len(), 2);
        assert_eq!(r.rows[0][1], "Wet\nland, \"coastal\"");
        assert_eq!(r.rows[1][1], "Class 2");
    }
}
