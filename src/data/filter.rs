use std::collections::HashSet;

use serde::Serialize;

use super::model::{CellValue, RecordSet};
use crate::error::Result;

/// Physical-layer features plus the derived CIR summaries.
pub const DEFAULT_OUTLIER_FEATURES: [&str; 12] = [
    "FP_IDX",
    "FP_AMP1",
    "FP_AMP2",
    "FP_AMP3",
    "STDEV_NOISE",
    "CIR_PWR",
    "MAX_NOISE",
    "RXPACC",
    "CIR_MEAN",
    "CIR_VAR",
    "CIR_SKEW",
    "CIR_ENERGY_FIRST_100",
];

pub const DEFAULT_VOTE_THRESHOLD: usize = 3;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

// ---------------------------------------------------------------------------
// Configuration and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Columns the IQR test runs on.
    pub features: Vec<String>,
    /// Minimum number of extreme features that makes a row an outlier.
    pub vote_threshold: usize,
    /// Fence distance from the quartiles, in IQRs.
    pub iqr_multiplier: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            features: DEFAULT_OUTLIER_FEATURES.iter().map(|f| f.to_string()).collect(),
            vote_threshold: DEFAULT_VOTE_THRESHOLD,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

/// Row counts for each removal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilterReport {
    pub input_rows: usize,
    pub outlier_rows: usize,
    pub duplicate_rows: usize,
    pub output_rows: usize,
}

// ---------------------------------------------------------------------------
// Quartiles and fences
// ---------------------------------------------------------------------------

/// Quantile of already sorted values, interpolating linearly between the
/// closest ranks at position `(n - 1) * q`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Lower and upper Tukey fences of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Fences {
    /// Fences over the non-missing values of a column.
    ///
    /// An all-missing column yields NaN fences, which flag nothing.
    pub fn from_column(values: &[Option<f64>], multiplier: f64) -> Self {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        }
    }

    pub fn is_extreme(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

// ---------------------------------------------------------------------------
// Row filter
// ---------------------------------------------------------------------------

/// Per-row flags: extreme on at least `vote_threshold` features.
///
/// Fences are computed once over the full columns before anything is removed.
pub fn outlier_rows(input: &RecordSet, config: &FilterConfig) -> Result<Vec<bool>> {
    let mut votes = vec![0usize; input.len()];
    for feature in &config.features {
        let column = input.numeric_column(feature)?;
        let fences = Fences::from_column(&column, config.iqr_multiplier);
        log::debug!(
            "{feature}: q1={} q3={} fences=[{}, {}]",
            fences.q1,
            fences.q3,
            fences.lower,
            fences.upper
        );
        for (vote, value) in votes.iter_mut().zip(&column) {
            if value.is_some_and(|v| fences.is_extreme(v)) {
                *vote += 1;
            }
        }
    }
    Ok(votes
        .into_iter()
        .map(|v| v >= config.vote_threshold)
        .collect())
}

/// Indices of the first occurrence of every distinct row, in order.
fn first_occurrences<'a, I>(rows: I) -> Vec<usize>
where
    I: IntoIterator<Item = (usize, &'a Vec<CellValue>)>,
{
    let mut seen: HashSet<&'a Vec<CellValue>> = HashSet::new();
    rows.into_iter()
        .filter(|(_, row)| seen.insert(*row))
        .map(|(i, _)| i)
        .collect()
}

/// Remove outlier rows, then exact duplicate rows.
///
/// Columns are untouched and surviving rows keep their relative order. The
/// first occurrence of a duplicated row is the one kept.
pub fn filter_rows(input: &RecordSet, config: &FilterConfig) -> Result<(RecordSet, FilterReport)> {
    let flagged = outlier_rows(input, config)?;

    let inliers = input
        .rows()
        .iter()
        .enumerate()
        .filter(|(i, _)| !flagged[*i]);
    let inlier_count = flagged.iter().filter(|f| !**f).count();
    let kept = first_occurrences(inliers);

    let report = FilterReport {
        input_rows: input.len(),
        outlier_rows: input.len() - inlier_count,
        duplicate_rows: inlier_count - kept.len(),
        output_rows: kept.len(),
    };
    log::info!(
        "row filter: {} in, {} outliers, {} duplicates, {} out",
        report.input_rows,
        report.outlier_rows,
        report.duplicate_rows,
        report.output_rows
    );

    Ok((input.select_rows(kept), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CleanError;

    fn column_set(name: &str, values: &[f64]) -> RecordSet {
        RecordSet::from_rows(
            vec![name.to_string()],
            values.iter().map(|&v| vec![CellValue::Float(v)]).collect(),
        )
        .unwrap()
    }

    fn single_feature(name: &str, threshold: usize) -> FilterConfig {
        FilterConfig {
            features: vec![name.to_string()],
            vote_threshold: threshold,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn quartiles_interpolate_linearly() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0].map(Some).to_vec();
        let fences = Fences::from_column(&values, 1.5);
        assert!((fences.q1 - 2.25).abs() < 1e-12);
        assert!((fences.q3 - 4.75).abs() < 1e-12);
        assert!((fences.upper - 8.5).abs() < 1e-12);
        assert!((fences.lower + 1.5).abs() < 1e-12);
    }

    #[test]
    fn single_vote_flags_only_the_extreme_value() {
        let set = column_set("x", &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        let flagged = outlier_rows(&set, &single_feature("x", 1)).unwrap();
        assert_eq!(flagged, vec![false, false, false, false, false, true]);

        let (out, report) = filter_rows(&set, &single_feature("x", 1)).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(report.outlier_rows, 1);
        assert_eq!(out.rows()[4], vec![CellValue::Float(5.0)]);
    }

    #[test]
    fn row_needs_enough_extreme_features() {
        let columns: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::new();
        for i in 0..8 {
            let v = i as f64;
            rows.push(vec![CellValue::Float(v), CellValue::Float(v), CellValue::Float(v)]);
        }
        // Extreme on two features only.
        rows.push(vec![CellValue::Float(500.0), CellValue::Float(500.0), CellValue::Float(4.0)]);
        // Extreme on all three.
        rows.push(vec![CellValue::Float(900.0), CellValue::Float(900.0), CellValue::Float(900.0)]);
        let set = RecordSet::from_rows(columns.clone(), rows).unwrap();

        let config = FilterConfig {
            features: columns,
            vote_threshold: 3,
            ..FilterConfig::default()
        };
        let flagged = outlier_rows(&set, &config).unwrap();
        assert!(!flagged[8]);
        assert!(flagged[9]);
        assert_eq!(flagged.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn duplicates_keep_the_first_occurrence() {
        let set = RecordSet::from_rows(
            vec!["id".into(), "v".into()],
            vec![
                vec![CellValue::Integer(1), CellValue::Float(0.5)],
                vec![CellValue::Integer(2), CellValue::Float(0.7)],
                vec![CellValue::Integer(1), CellValue::Float(0.5)],
                vec![CellValue::Integer(3), CellValue::Null],
                vec![CellValue::Integer(3), CellValue::Null],
            ],
        )
        .unwrap();
        let config = FilterConfig {
            features: vec!["v".into()],
            vote_threshold: 1,
            ..FilterConfig::default()
        };

        let (out, report) = filter_rows(&set, &config).unwrap();
        assert_eq!(report.duplicate_rows, 2);
        assert_eq!(report.outlier_rows, 0);
        assert_eq!(out.rows(), &set.rows()[0..2].iter().chain(&set.rows()[3..4]).cloned().collect::<Vec<_>>()[..]);
    }

    #[test]
    fn filtering_an_already_filtered_table_removes_nothing() {
        let set = column_set("x", &[1.0, 2.0, 3.0, 3.0, 4.0, 5.0, 100.0]);
        let config = single_feature("x", 1);

        let (once, first) = filter_rows(&set, &config).unwrap();
        assert_eq!(first.output_rows, 5);
        let (twice, second) = filter_rows(&once, &config).unwrap();
        assert_eq!(second.outlier_rows, 0);
        assert_eq!(second.duplicate_rows, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn output_rows_are_a_subset_of_input_rows() {
        let set = column_set("x", &[10.0, -400.0, 11.0, 12.0, 10.0, 13.0, 9.0]);
        let (out, report) = filter_rows(&set, &single_feature("x", 1)).unwrap();
        assert!(out.len() <= set.len());
        assert_eq!(report.output_rows, out.len());
        for row in out.rows() {
            assert!(set.rows().contains(row));
        }
    }

    #[test]
    fn missing_feature_is_an_error() {
        let set = column_set("x", &[1.0]);
        let err = filter_rows(&set, &single_feature("y", 1)).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(name) if name == "y"));
    }

    #[test]
    fn empty_input_is_a_valid_result() {
        let set = RecordSet::new(vec!["x".to_string()]);
        let (out, report) = filter_rows(&set, &single_feature("x", 1)).unwrap();
        assert!(out.is_empty());
        assert_eq!(report, FilterReport::default());
    }

    #[test]
    fn null_cells_are_never_extreme() {
        let set = RecordSet::from_rows(
            vec!["x".into()],
            vec![
                vec![CellValue::Float(1.0)],
                vec![CellValue::Null],
                vec![CellValue::Float(2.0)],
            ],
        )
        .unwrap();
        let flagged = outlier_rows(&set, &single_feature("x", 1)).unwrap();
        assert_eq!(flagged, vec![false, false, false]);
    }
}
