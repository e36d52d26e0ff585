use std::collections::HashMap;
use std::fmt;

use crate::error::{CleanError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a record set
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
///
/// Rows are hashed and compared as a whole during deduplication, so
/// `CellValue` must be `Eq + Hash`. Floats compare by IEEE total order after
/// folding `-0.0` into `0.0` and every NaN into one, so `0.0 == -0.0` and
/// `NaN == NaN` (two missing readings are the same reading).
#[derive(Debug, Clone)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

// -- Manual Eq/Ord/Hash so whole rows can live in a HashSet --

/// One representative per equal float: a single zero and a single NaN.
fn canonical_float(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => canonical_float(*a).total_cmp(&canonical_float(*b)),
            (String(a), String(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => canonical_float(*f).to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::String(s) => s.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64`, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Guess the type of a raw text field.
    pub fn parse(s: &str) -> CellValue {
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        match s {
            "true" | "True" | "TRUE" => CellValue::Bool(true),
            "false" | "False" | "FALSE" => CellValue::Bool(false),
            _ => CellValue::String(s.to_string()),
        }
    }
}

/// Read a cell as a number for statistics.
///
/// Null and NaN are missing (`Ok(None)`); strings and bools are an error.
pub fn numeric_cell(value: &CellValue, column: &str, row: usize) -> Result<Option<f64>> {
    match value {
        CellValue::Integer(i) => Ok(Some(*i as f64)),
        CellValue::Float(v) if v.is_nan() => Ok(None),
        CellValue::Float(v) => Ok(Some(*v)),
        CellValue::Null => Ok(None),
        other => Err(CleanError::NonNumeric {
            column: column.to_string(),
            row,
            value: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// RecordSet – an ordered table of rows
// ---------------------------------------------------------------------------

/// An ordered header plus ordered rows aligned with it.
///
/// Every row is exactly as wide as the header. Transformations return a new
/// set and leave `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RecordSet {
    /// An empty set with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a set from a header and rows, checking row widths.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut set = Self::new(columns);
        set.rows.reserve(rows.len());
        for row in rows {
            set.push_row(row)?;
        }
        Ok(set)
    }

    /// Append a row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(CleanError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(rows, columns)`, the way shapes show up in the logs.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Position of a column in the header.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CleanError::MissingColumn(name.to_string()))
    }

    /// A whole column as numbers; missing cells are `None`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, values)| numeric_cell(&values[idx], name, row))
            .collect()
    }

    /// A copy without the named columns. Every name must exist.
    pub fn without_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<RecordSet> {
        let mut dropped = vec![false; self.columns.len()];
        for name in names {
            dropped[self.column_index(name.as_ref())?] = true;
        }

        let columns = self
            .columns
            .iter()
            .zip(&dropped)
            .filter(|(_, &d)| !d)
            .map(|(c, _)| c.clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&dropped)
                    .filter(|(_, &d)| !d)
                    .map(|(v, _)| v.clone())
                    .collect()
            })
            .collect();

        Ok(RecordSet { columns, rows })
    }

    /// A copy with extra columns, one value per row for each.
    ///
    /// A name that already exists replaces that column in place; new names
    /// are appended in the order given.
    pub fn with_columns(&self, new_columns: Vec<(String, Vec<CellValue>)>) -> Result<RecordSet> {
        let mut out = self.clone();
        for (name, values) in new_columns {
            if values.len() != out.rows.len() {
                return Err(CleanError::RowWidth {
                    row: values.len().min(out.rows.len()),
                    expected: out.rows.len(),
                    found: values.len(),
                });
            }
            match out.columns.iter().position(|c| *c == name) {
                Some(idx) => {
                    log::debug!("overwriting existing column {name}");
                    for (row, value) in out.rows.iter_mut().zip(values) {
                        row[idx] = value;
                    }
                }
                None => {
                    out.columns.push(name);
                    for (row, value) in out.rows.iter_mut().zip(values) {
                        row.push(value);
                    }
                }
            }
        }
        Ok(out)
    }

    /// A copy holding only the rows at `indices`, in the order given.
    pub fn select_rows<I: IntoIterator<Item = usize>>(&self, indices: I) -> RecordSet {
        RecordSet {
            columns: self.columns.clone(),
            rows: indices.into_iter().map(|i| self.rows[i].clone()).collect(),
        }
    }

    /// A copy with columns rearranged into `order`.
    ///
    /// `order` must name exactly the columns of `self`.
    pub fn reorder_columns(&self, order: &[String]) -> Result<RecordSet> {
        let positions: Vec<usize> = order
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
            .collect();
        Ok(RecordSet {
            columns: order.to_vec(),
            rows,
        })
    }

    /// Move all rows of `other` onto the end of `self`.
    ///
    /// Headers must be identical, column order included.
    pub fn append(&mut self, other: RecordSet) -> Result<()> {
        if other.columns != self.columns {
            return Err(CleanError::SchemaMismatch(format!(
                "expected columns {:?}, found {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Promote columns that mix integer and float cells to all-float.
    ///
    /// A column-typed dataframe would hold `1` and `1.5` in one float column,
    /// so `1` and `1.0` must compare equal after loading.
    pub fn promote_mixed_numeric(&mut self) {
        let mut kinds: HashMap<usize, (bool, bool)> = HashMap::new();
        for row in &self.rows {
            for (idx, value) in row.iter().enumerate() {
                let entry = kinds.entry(idx).or_default();
                match value {
                    CellValue::Integer(_) => entry.0 = true,
                    CellValue::Float(_) => entry.1 = true,
                    _ => {}
                }
            }
        }

        let mixed: Vec<usize> = kinds
            .into_iter()
            .filter(|(_, (ints, floats))| *ints && *floats)
            .map(|(idx, _)| idx)
            .collect();
        if mixed.is_empty() {
            return;
        }

        for row in &mut self.rows {
            for &idx in &mixed {
                if let CellValue::Integer(i) = row[idx] {
                    row[idx] = CellValue::Float(i as f64);
                }
            }
        }
    }
}
