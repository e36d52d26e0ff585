use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt8Type,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use walkdir::WalkDir;

use super::model::{CellValue, RecordSet};
use crate::error::{CleanError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a record set from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one record per line
/// * `.parquet` – flat scalar columns (ints, floats, strings, bools)
pub fn load_file(path: &Path) -> Result<RecordSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut set = match ext.as_str() {
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        _ => return Err(CleanError::UnsupportedFormat(path.to_path_buf())),
    };
    set.promote_mixed_numeric();

    log::debug!("loaded {} with shape {:?}", path.display(), set.shape());
    Ok(set)
}

/// Load several files and concatenate them in the order given.
///
/// Later files are aligned to the first file's column order. A later file
/// lacking one of those columns fails with `MissingColumn`; one with extra
/// columns fails with `SchemaMismatch`. Integer/float promotion is applied
/// to the combined table, not just per file.
pub fn load_many(paths: &[PathBuf]) -> Result<RecordSet> {
    let mut iter = paths.iter();
    let Some(first) = iter.next() else {
        return Ok(RecordSet::default());
    };

    let mut combined = load_file(first)?;
    for path in iter {
        let next = load_file(path)?;
        if let Some(extra) = next.columns().iter().find(|c| !combined.has_column(c)) {
            return Err(CleanError::SchemaMismatch(format!(
                "{} has unexpected column '{extra}'",
                path.display()
            )));
        }
        let aligned = next.reorder_columns(combined.columns())?;
        combined.append(aligned)?;
    }
    // A column may be integer-only in one file and mixed in another.
    combined.promote_mixed_numeric();
    Ok(combined)
}

/// Expand a file-name pattern into the matching files, sorted by name.
///
/// Wildcards (`*`, `?`) are honoured in the last path component only, the
/// way `../data/raw/uwb_dataset_part*.csv` is written.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_path = Path::new(pattern);
    let file_pattern = pattern_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CleanError::NoInputFiles(pattern.to_string()))?;
    let dir = match pattern_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if wildcard_match(file_pattern, name) {
                matches.push(entry.path().to_path_buf());
            }
        }
    }

    // Directory listing order is platform dependent; sort so that reruns
    // concatenate in the same order.
    matches.sort();
    log::debug!("pattern {pattern} matched {} files", matches.len());
    Ok(matches)
}

/// Match `name` against a pattern with `*` (any run) and `?` (any char).
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every field typed on its own
/// (empty → null, integer, float, bool, else text).
fn load_csv(path: &Path) -> Result<RecordSet> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut set = RecordSet::new(headers);
    for result in reader.records() {
        let record = result?;
        set.push_row(record.iter().map(CellValue::parse).collect())?;
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat scalar columns, such as those written by
/// [`super::writer`]. Unsupported Arrow types come back as their type name.
fn load_parquet(path: &Path) -> Result<RecordSet> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut set = RecordSet::new(headers);
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect();
            set.push_row(values)?;
        }
    }
    Ok(set)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => CellValue::Integer(col.as_primitive::<UInt8Type>().value(row) as i64),
        DataType::UInt16 => CellValue::Integer(col.as_primitive::<UInt16Type>().value(row) as i64),
        DataType::UInt32 => CellValue::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn csv_fields_are_typed_and_mixed_columns_promoted() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("part1.csv");
        fs::write(&path, "NLOS,RANGE,LABEL\n0,3.5,los\n1,4,\n").unwrap();

        let set = load_file(&path).unwrap();
        assert_eq!(set.shape(), (2, 3));
        assert_eq!(set.rows()[0][0], CellValue::Integer(0));
        assert_eq!(set.rows()[1][1], CellValue::Float(4.0));
        assert_eq!(set.rows()[1][2], CellValue::Null);
    }

    #[test]
    fn ragged_csv_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        assert!(matches!(load_file(&path), Err(CleanError::Csv(_))));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("data.xlsx")).unwrap_err();
        assert!(matches!(err, CleanError::UnsupportedFormat(_)));
    }

    #[test]
    fn pattern_matches_are_sorted_by_name() {
        let temp = tempdir().unwrap();
        for name in ["uwb_dataset_part3.csv", "uwb_dataset_part1.csv", "notes.txt", "uwb_dataset_part2.csv"] {
            fs::write(temp.path().join(name), "a\n1\n").unwrap();
        }
        let pattern = temp.path().join("uwb_dataset_part*.csv");
        let found = resolve_pattern(pattern.to_str().unwrap()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["uwb_dataset_part1.csv", "uwb_dataset_part2.csv", "uwb_dataset_part3.csv"]
        );
    }

    #[test]
    fn pattern_in_missing_directory_matches_nothing() {
        let temp = tempdir().unwrap();
        let pattern = temp.path().join("nope").join("*.csv");
        assert!(resolve_pattern(pattern.to_str().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn wildcards() {
        assert!(wildcard_match("part*.csv", "part12.csv"));
        assert!(wildcard_match("part?.csv", "part1.csv"));
        assert!(!wildcard_match("part?.csv", "part12.csv"));
        assert!(wildcard_match("*", ""));
        assert!(!wildcard_match("part*.csv", "part1.parquet"));
    }

    #[test]
    fn load_many_aligns_columns_and_keeps_file_order() {
        let temp = tempdir().unwrap();
        let first = temp.path().join("a.csv");
        let second = temp.path().join("b.csv");
        fs::write(&first, "x,y\n1,2\n").unwrap();
        fs::write(&second, "y,x\n4,3\n").unwrap();

        let set = load_many(&[first, second]).unwrap();
        assert_eq!(set.columns(), &["x".to_string(), "y".to_string()]);
        assert_eq!(set.rows()[1], vec![CellValue::Integer(3), CellValue::Integer(4)]);
    }

    #[test]
    fn load_many_rejects_schema_drift() {
        let temp = tempdir().unwrap();
        let first = temp.path().join("a.csv");
        let missing = temp.path().join("b.csv");
        let extra = temp.path().join("c.csv");
        fs::write(&first, "x,y\n1,2\n").unwrap();
        fs::write(&missing, "x\n1\n").unwrap();
        fs::write(&extra, "x,y,z\n1,2,3\n").unwrap();

        let err = load_many(&[first.clone(), missing]).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(name) if name == "y"));
        let err = load_many(&[first, extra]).unwrap_err();
        assert!(matches!(err, CleanError::SchemaMismatch(_)));
    }

    #[test]
    fn load_many_promotes_across_files() {
        let temp = tempdir().unwrap();
        let first = temp.path().join("part1.csv");
        let second = temp.path().join("part2.csv");
        // x is integer-only in the first file and mixed in the second.
        fs::write(&first, "x,y\n1,5\n2,6\n").unwrap();
        fs::write(&second, "x,y\n1,5\n1.5,7\n").unwrap();

        let set = load_many(&[first, second]).unwrap();
        assert_eq!(set.rows()[0], vec![CellValue::Float(1.0), CellValue::Integer(5)]);
        assert_eq!(set.rows()[0], set.rows()[2]);

        let config = crate::data::filter::FilterConfig {
            features: vec!["y".into()],
            vote_threshold: 1,
            ..Default::default()
        };
        let (out, report) = crate::data::filter::filter_rows(&set, &config).unwrap();
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(out.len(), 3);
    }
}
