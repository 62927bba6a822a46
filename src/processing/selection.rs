// src/processing/selection.rs
//! Univariate feature scoring and select-k-best ranking.
//!
//! A classification target (integral, at most [`MAX_CLASSES`] distinct
//! values) is scored with the χ² statistic; anything else with the
//! F-statistic of a univariate linear regression. χ² needs non-negative
//! features, so a table with negative values falls back to F-regression and
//! says so through [`SelectionNotice`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::special::{chi2_sf, f_sf};

/// Largest number of distinct target values still treated as classes.
pub const MAX_CLASSES: usize = 20;

/// Cells read as missing, in addition to the empty string.
const MISSING_MARKERS: [&str; 5] = ["NA", "N/A", "NaN", "nan", "null"];

/// Empty cells, missing markers and non-finite numbers (`inf`, `-inf`).
fn is_missing_cell(cell: &str) -> bool {
    cell.is_empty() || MISSING_MARKERS.contains(&cell) || cell.parse::<f64>().is_ok_and(|v| !v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric { values: Vec<Option<f64>>, integral: bool },
    Text(Vec<Option<String>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Numeric { values, .. } => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric { values, .. } => values[row].is_none(),
            Column::Text(values) => values[row].is_none(),
        }
    }

    fn from_cells(cells: Vec<Option<&str>>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|c| match c {
                None => Some(None),
                Some(s) => s.parse::<f64>().ok().map(Some),
            })
            .collect();
        match parsed {
            Some(values) => {
                let integral = cells.iter().flatten().all(|s| s.parse::<i64>().is_ok());
                Column::Numeric { values, integral }
            }
            None => Column::Text(cells.into_iter().map(|c| c.map(str::to_string)).collect()),
        }
    }
}

/// Named, typed columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureTable {
    /// Infer column types from raw string records. A column is numeric when
    /// every present cell parses as a float.
    pub fn from_records(headers: Vec<String>, rows: &[Vec<String>]) -> Result<Self> {
        if headers.is_empty() {
            return Err(Error::EmptyInput("table header"));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(Error::MalformedTable(format!(
                "row {} has {} cells, header has {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        let columns = (0..headers.len())
            .map(|c| {
                let cells = rows
                    .iter()
                    .map(|r| {
                        let cell = r[c].trim();
                        (!is_missing_cell(cell)).then_some(cell)
                    })
                    .collect();
                Column::from_cells(cells)
            })
            .collect();
        Ok(Self { names: headers, columns })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names.iter().position(|n| n == name).map(|i| &self.columns[i])
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Classification,
    Regression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFunction {
    Chi2,
    FRegression,
}

impl fmt::Display for ScoreFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreFunction::Chi2 => f.write_str("chi-squared (classification)"),
            ScoreFunction::FRegression => f.write_str("F-regression"),
        }
    }
}

/// Degraded paths the caller should surface to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionNotice {
    /// Classification target, but negative feature values rule out χ².
    NegativeFeaturesForChi2,
}

impl fmt::Display for SelectionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionNotice::NegativeFeaturesForChi2 => {
                f.write_str("chi-squared requires non-negative features; scored with F-regression instead")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureScore {
    pub name: String,
    pub score: f64,
    pub p_value: f64,
    /// 1-based position after sorting by score.
    pub rank: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    pub target: String,
    pub task: Task,
    pub score_function: ScoreFunction,
    pub notice: Option<SelectionNotice>,
    pub rows_used: usize,
    pub rows_dropped: usize,
    /// Original target values in encoded order, for text targets.
    pub encoded_labels: Option<Vec<String>>,
    pub k: usize,
    /// Ranked, best first.
    pub scores: Vec<FeatureScore>,
}

impl SelectionReport {
    pub fn selected(&self) -> impl Iterator<Item = &FeatureScore> {
        self.scores.iter().filter(|s| s.selected)
    }
}

/// χ² statistic and p-value of each non-negative feature column against
/// class indices `y` (one per row).
pub fn chi2(x: ArrayView2<'_, f64>, y: &[usize]) -> Result<Vec<(f64, f64)>> {
    let (n, m) = x.dim();
    if y.len() != n {
        return Err(Error::ShapeMismatch {
            expected: (n, 1),
            actual: (y.len(), 1),
        });
    }
    if n == 0 {
        return Err(Error::EmptyInput("feature rows"));
    }
    if let Some(v) = x.iter().find(|v| **v < 0.0) {
        return Err(Error::invalid("feature value", v, "chi-squared requires non-negative input"));
    }

    let classes = y.iter().copied().max().map_or(0, |c| c + 1);
    let mut observed = Array2::<f64>::zeros((classes, m));
    let mut class_counts = vec![0usize; classes];
    for (row, &class) in x.outer_iter().zip(y) {
        let mut target = observed.row_mut(class);
        target += &row;
        class_counts[class] += 1;
    }

    let feature_sum = x.sum_axis(Axis(0));
    let dof = class_counts.iter().filter(|&&c| c > 0).count() as f64 - 1.0;

    let scores = (0..m)
        .map(|j| {
            let stat: f64 = class_counts
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(c, &count)| {
                    let expected = count as f64 / n as f64 * feature_sum[j];
                    (observed[[c, j]] - expected).powi(2) / expected
                })
                .sum();
            (stat, chi2_sf(stat, dof))
        })
        .collect();
    Ok(scores)
}

/// F-statistic and p-value of a univariate linear regression of `y` on each
/// feature column.
///
/// A constant feature scores 0 (p = 1); a perfectly correlated one scores
/// infinity (p = 0).
pub fn f_regression(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Vec<(f64, f64)>> {
    let (n, _) = x.dim();
    if y.len() != n {
        return Err(Error::ShapeMismatch {
            expected: (n, 1),
            actual: (y.len(), 1),
        });
    }
    if n < 3 {
        return Err(Error::invalid("rows", n, "F-regression needs at least 3 rows"));
    }

    let y_mean = y.sum() / n as f64;
    let y_centered: Array1<f64> = y.mapv(|v| v - y_mean);
    let y_norm = y_centered.dot(&y_centered).sqrt();
    let dof = (n - 2) as f64;

    let scores = x
        .axis_iter(Axis(1))
        .map(|col| {
            let mean = col.sum() / n as f64;
            let centered = col.mapv(|v| v - mean);
            let norm = centered.dot(&centered).sqrt();
            if norm == 0.0 || y_norm == 0.0 {
                return (0.0, 1.0);
            }
            let r = centered.dot(&y_centered) / (norm * y_norm);
            let r2 = r * r;
            if r2 >= 1.0 {
                return (f64::INFINITY, 0.0);
            }
            let f = r2 / (1.0 - r2) * dof;
            (f, f_sf(f, 1.0, dof))
        })
        .collect();
    Ok(scores)
}

/// Drop incomplete rows, pick a score function from the target, score every
/// numeric feature and keep the `k` best.
pub fn select_k_best(table: &FeatureTable, target: &str, k: Option<usize>) -> Result<SelectionReport> {
    let target_column = table
        .column(target)
        .ok_or_else(|| Error::UnknownColumn(target.to_string()))?;

    let total_rows = table.row_count();
    let kept: Vec<usize> = (0..total_rows)
        .filter(|&r| table.columns.iter().all(|c| !c.is_missing(r)))
        .collect();
    if kept.is_empty() {
        return Err(Error::EmptyInput("table rows after dropping missing values"));
    }
    let rows_dropped = total_rows - kept.len();
    if rows_dropped > 0 {
        log::info!("dropped {} rows with missing values", rows_dropped);
    }

    let features: Vec<(&str, &[Option<f64>])> = table
        .names
        .iter()
        .zip(&table.columns)
        .filter(|(name, _)| name.as_str() != target)
        .filter_map(|(name, col)| match col {
            Column::Numeric { values, .. } => Some((name.as_str(), values.as_slice())),
            Column::Text(_) => None,
        })
        .collect();
    if features.is_empty() {
        return Err(Error::EmptyInput("numeric feature columns"));
    }

    let k = k.unwrap_or_else(|| features.len().min(10));
    if k == 0 || k > features.len() {
        return Err(Error::invalid(
            "k",
            k,
            format!("must be between 1 and {}", features.len()),
        ));
    }

    let x = Array2::from_shape_fn((kept.len(), features.len()), |(i, j)| {
        features[j].1[kept[i]].unwrap_or(f64::NAN)
    });

    let target = encode_target(target_column, &kept, target)?;
    let task = if target.integral && target.distinct <= MAX_CLASSES {
        Task::Classification
    } else {
        Task::Regression
    };

    let mut notice = None;
    let score_function = match task {
        Task::Classification if x.iter().any(|&v| v < 0.0) => {
            log::warn!("{}", SelectionNotice::NegativeFeaturesForChi2);
            notice = Some(SelectionNotice::NegativeFeaturesForChi2);
            ScoreFunction::FRegression
        }
        Task::Classification => ScoreFunction::Chi2,
        Task::Regression => ScoreFunction::FRegression,
    };
    log::debug!(
        "{:?} target '{}' with {} distinct values, scoring {} features with {}",
        task,
        target.name,
        target.distinct,
        features.len(),
        score_function
    );

    let raw = match score_function {
        ScoreFunction::Chi2 => chi2(x.view(), &target.classes)?,
        ScoreFunction::FRegression => f_regression(x.view(), target.values.view())?,
    };

    let scores = raw
        .into_iter()
        .zip(&features)
        .map(|((score, p_value), (name, _))| (name.to_string(), score, p_value))
        .sorted_by(|a, b| rank_order(a.1, b.1))
        .enumerate()
        .map(|(i, (name, score, p_value))| FeatureScore {
            name,
            score,
            p_value,
            rank: i + 1,
            selected: i < k,
        })
        .collect();

    Ok(SelectionReport {
        target: target.name,
        task,
        score_function,
        notice,
        rows_used: kept.len(),
        rows_dropped,
        encoded_labels: target.labels,
        k,
        scores,
    })
}

/// Descending by score with NaN last.
fn rank_order(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

struct EncodedTarget {
    name: String,
    values: Array1<f64>,
    /// Index into the sorted distinct values.
    classes: Vec<usize>,
    distinct: usize,
    integral: bool,
    labels: Option<Vec<String>>,
}

fn encode_target(column: &Column, rows: &[usize], name: &str) -> Result<EncodedTarget> {
    match column {
        Column::Text(values) => {
            let cells: Vec<&str> = rows.iter().filter_map(|&r| values[r].as_deref()).collect();
            let labels: BTreeSet<&str> = cells.iter().copied().collect();
            let index: BTreeMap<&str, usize> = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();
            let classes: Vec<usize> = cells.iter().map(|c| index[c]).collect();
            log::info!("target '{}' label encoded into {} classes", name, labels.len());
            Ok(EncodedTarget {
                name: name.to_string(),
                values: classes.iter().map(|&c| c as f64).collect(),
                distinct: labels.len(),
                classes,
                integral: true,
                labels: Some(labels.into_iter().map(str::to_string).collect()),
            })
        }
        Column::Numeric { values, integral } => {
            let values: Array1<f64> = rows.iter().filter_map(|&r| values[r]).collect();
            let distinct: Vec<f64> = values
                .iter()
                .copied()
                .sorted_by(|a, b| a.total_cmp(b))
                .dedup()
                .collect();
            let classes = values
                .iter()
                .map(|v| distinct.partition_point(|d| d.total_cmp(v).is_lt()))
                .collect();
            Ok(EncodedTarget {
                name: name.to_string(),
                values,
                classes,
                distinct: distinct.len(),
                integral: *integral,
                labels: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn table(headers: &[&str], rows: &[&[&str]]) -> FeatureTable {
        FeatureTable::from_records(
            headers.iter().map(|s| s.to_string()).collect(),
            &rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn chi2_known_values() {
        // Two classes, feature 0 tied to the class, feature 1 uninformative
        let x = array![[1.0, 1.0], [1.0, 1.0], [0.0, 1.0], [0.0, 1.0]];
        let y = [1usize, 1, 0, 0];
        let scores = chi2(x.view(), &y).unwrap();
        // observed [0, 2], expected [1, 1]
        assert_relative_eq!(scores[0].0, 2.0, epsilon = 1e-12);
        assert_relative_eq!(scores[0].1, chi2_sf(2.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(scores[1].0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(scores[1].1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn chi2_rejects_negative_features() {
        let x = array![[-1.0], [1.0]];
        assert!(chi2(x.view(), &[0, 1]).is_err());
    }

    #[test]
    fn f_regression_known_values() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let y = array![1.0, 3.0, 2.0, 4.0];
        let scores = f_regression(x.view(), y.view()).unwrap();
        // r = 0.8, F = 0.64 / 0.36 * 2
        assert_relative_eq!(scores[0].0, 0.64 / 0.36 * 2.0, epsilon = 1e-10);
        assert!(scores[0].1 > 0.0 && scores[0].1 < 1.0);
        assert_eq!(scores[1], (0.0, 1.0));
    }

    #[test]
    fn classification_target_uses_chi2() {
        let t = table(
            &["a", "b", "label"],
            &[&["1", "0", "x"], &["2", "0", "x"], &["0", "3", "y"], &["0", "4", "y"]],
        );
        let report = select_k_best(&t, "label", Some(1)).unwrap();
        assert_eq!(report.task, Task::Classification);
        assert_eq!(report.score_function, ScoreFunction::Chi2);
        assert_eq!(report.encoded_labels, Some(vec!["x".to_string(), "y".to_string()]));
        assert_eq!(report.selected().count(), 1);
        assert!(report.notice.is_none());
    }

    #[test]
    fn negative_features_fall_back_to_f_regression() {
        let t = table(
            &["a", "b", "class"],
            &[&["-1", "0", "0"], &["2", "1", "0"], &["0", "3", "1"], &["1", "4", "1"]],
        );
        let report = select_k_best(&t, "class", None).unwrap();
        assert_eq!(report.task, Task::Classification);
        assert_eq!(report.score_function, ScoreFunction::FRegression);
        assert_eq!(report.notice, Some(SelectionNotice::NegativeFeaturesForChi2));
    }

    #[test]
    fn continuous_target_is_regression() {
        let t = table(
            &["a", "y"],
            &[&["1", "0.5"], &["2", "1.5"], &["3", "2.1"], &["4", "3.9"]],
        );
        let report = select_k_best(&t, "y", None).unwrap();
        assert_eq!(report.task, Task::Regression);
        assert_eq!(report.k, 1);
    }

    #[test]
    fn missing_rows_and_text_features_are_skipped() {
        let t = table(
            &["a", "name", "b", "y"],
            &[
                &["1", "p", "4", "0.1"],
                &["", "q", "3", "0.2"],
                &["3", "r", "NA", "0.3"],
                &["4", "s", "1", "0.4"],
                &["5", "t", "0", "0.5"],
                &["6", "u", "2", "0.6"],
            ],
        );
        let report = select_k_best(&t, "y", Some(2)).unwrap();
        assert_eq!(report.rows_dropped, 2);
        assert_eq!(report.rows_used, 4);
        assert_eq!(report.scores.len(), 2);
        assert_eq!(report.scores[0].name, "a");
        assert_eq!(report.scores[0].rank, 1);
    }

    #[test]
    fn infinite_cells_count_as_missing() {
        let t = table(
            &["a", "b", "y"],
            &[
                &["1", "inf", "0.1"],
                &["2", "4", "0.2"],
                &["-inf", "3", "0.3"],
                &["4", "1", "0.45"],
                &["5", "0", "0.5"],
                &["6", "2", "0.6"],
            ],
        );
        assert!(matches!(t.column("b"), Some(Column::Numeric { .. })));
        let report = select_k_best(&t, "y", None).unwrap();
        assert_eq!(report.rows_dropped, 2);
        assert_eq!(report.rows_used, 4);
        assert!(report.scores.iter().all(|s| s.score.is_finite()));
    }

    #[test]
    fn bad_k_and_unknown_target_are_errors() {
        let t = table(&["a", "y"], &[&["1", "1"], &["2", "2"], &["3", "1"]]);
        assert!(matches!(select_k_best(&t, "z", None), Err(Error::UnknownColumn(_))));
        assert!(select_k_best(&t, "y", Some(0)).is_err());
        assert!(select_k_best(&t, "y", Some(2)).is_err());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = FeatureTable::from_records(vec!["a".into(), "b".into()], &[vec!["1".into()]]);
        assert!(matches!(err, Err(Error::MalformedTable(_))));
    }
}
