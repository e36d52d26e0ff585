use serde::{Deserialize, Serialize};

use super::model::{numeric_cell, CellValue, RecordSet};
use crate::error::Result;

/// Administrative radio settings that carry no information once the
/// recordings are pooled.
pub const ADMIN_COLUMNS: [&str; 5] = ["CH", "FRAME_LEN", "BITRATE", "PRFR", "PREAM_LEN"];

/// Number of CIR samples per recording.
pub const CIR_LEN: usize = 1016;

/// Leading CIR samples summed into the early-energy column.
pub const ENERGY_WINDOW: usize = 100;

/// Sums of squared deviations below this are treated as exactly zero.
const FLAT_TOLERANCE: f64 = 1e-14;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A per-row summary of the CIR run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedStat {
    Mean,
    Variance,
    Skewness,
    EnergyFirst100,
}

impl DerivedStat {
    /// The canonical derived column set, in output order.
    pub const CANONICAL: [DerivedStat; 4] = [
        DerivedStat::Mean,
        DerivedStat::Variance,
        DerivedStat::Skewness,
        DerivedStat::EnergyFirst100,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            DerivedStat::Mean => "CIR_MEAN",
            DerivedStat::Variance => "CIR_VAR",
            DerivedStat::Skewness => "CIR_SKEW",
            DerivedStat::EnergyFirst100 => "CIR_ENERGY_FIRST_100",
        }
    }
}

/// Bias convention for the skewness column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkewConvention {
    /// Adjusted Fisher–Pearson G1, `sqrt(n(n-1))/(n-2) * m3/m2^1.5`.
    #[default]
    AdjustedFisherPearson,
    /// Plain moment ratio g1, `m3/m2^1.5`.
    Population,
}

#[derive(Debug, Clone)]
pub struct DeriveConfig {
    /// Columns removed before deriving; each must be present.
    pub dropped_columns: Vec<String>,
    /// Prefix of the CIR run (`CIR0`, `CIR1`, ...).
    pub cir_prefix: String,
    pub cir_len: usize,
    pub derived: Vec<DerivedStat>,
    pub skew: SkewConvention,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            dropped_columns: ADMIN_COLUMNS.iter().map(|c| c.to_string()).collect(),
            cir_prefix: "CIR".to_string(),
            cir_len: CIR_LEN,
            derived: DerivedStat::CANONICAL.to_vec(),
            skew: SkewConvention::default(),
        }
    }
}

impl DeriveConfig {
    pub fn cir_columns(&self) -> Vec<String> {
        (0..self.cir_len)
            .map(|i| format!("{}{i}", self.cir_prefix))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Per-row statistics
// ---------------------------------------------------------------------------

/// Moment summary of one CIR run, over its non-missing samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirSummary {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub energy_first_100: f64,
}

impl CirSummary {
    /// Summarise one row of CIR samples; `None` marks a missing sample.
    pub fn from_samples(samples: &[Option<f64>], skew: SkewConvention) -> Self {
        let values: Vec<f64> = samples.iter().flatten().copied().collect();
        let energy_first_100: f64 = samples.iter().take(ENERGY_WINDOW).flatten().sum();

        let n = values.len() as f64;
        if values.is_empty() {
            return Self {
                mean: f64::NAN,
                variance: f64::NAN,
                skewness: f64::NAN,
                energy_first_100,
            };
        }

        let mean = values.iter().sum::<f64>() / n;
        let (mut ss2, mut ss3) = (0.0, 0.0);
        for &x in &values {
            let d = x - mean;
            ss2 += d * d;
            ss3 += d * d * d;
        }

        let variance = if values.len() < 2 { f64::NAN } else { ss2 / (n - 1.0) };

        let skewness = if values.len() < 3 {
            f64::NAN
        } else if ss2.abs() < FLAT_TOLERANCE {
            0.0
        } else {
            let m2 = ss2 / n;
            let m3 = ss3 / n;
            let g1 = m3 / m2.powf(1.5);
            match skew {
                SkewConvention::Population => g1,
                SkewConvention::AdjustedFisherPearson => (n * (n - 1.0)).sqrt() / (n - 2.0) * g1,
            }
        };

        Self {
            mean,
            variance,
            skewness,
            energy_first_100,
        }
    }

    pub fn get(&self, stat: DerivedStat) -> f64 {
        match stat {
            DerivedStat::Mean => self.mean,
            DerivedStat::Variance => self.variance,
            DerivedStat::Skewness => self.skewness,
            DerivedStat::EnergyFirst100 => self.energy_first_100,
        }
    }
}

// ---------------------------------------------------------------------------
// Feature deriver
// ---------------------------------------------------------------------------

/// Drop the administrative columns and append the CIR summary columns.
///
/// The output has exactly as many rows as `input`. Fails with
/// `MissingColumn` when a dropped column or any `CIR<i>` is absent.
pub fn derive_features(input: &RecordSet, config: &DeriveConfig) -> Result<RecordSet> {
    let cir_positions: Vec<(usize, String)> = config
        .cir_columns()
        .into_iter()
        .map(|name| input.column_index(&name).map(|idx| (idx, name)))
        .collect::<Result<_>>()?;

    let trimmed = input.without_columns(&config.dropped_columns)?;

    let mut derived: Vec<Vec<CellValue>> = vec![Vec::with_capacity(input.len()); config.derived.len()];
    let mut samples = Vec::with_capacity(cir_positions.len());
    for (row_no, row) in input.rows().iter().enumerate() {
        samples.clear();
        for (idx, name) in &cir_positions {
            samples.push(numeric_cell(&row[*idx], name, row_no)?);
        }
        let summary = CirSummary::from_samples(&samples, config.skew);
        for (column, stat) in derived.iter_mut().zip(&config.derived) {
            column.push(CellValue::Float(summary.get(*stat)));
        }
    }

    let new_columns = config
        .derived
        .iter()
        .map(|stat| stat.column_name().to_string())
        .zip(derived)
        .collect();
    let out = trimmed.with_columns(new_columns)?;

    log::debug!(
        "derived {} CIR summary columns over {} rows",
        config.derived.len(),
        out.len()
    );
    Ok(out)
}
