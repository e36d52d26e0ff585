use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::model::{CellValue, RecordSet};
use crate::error::{CleanError, Result};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Write a record set to a file.  Dispatch by extension, like the loader.
///
/// The data goes to a temporary sibling first and is renamed into place, so
/// a failed run never leaves a truncated output behind.
pub fn write_file(set: &RecordSet, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let bytes = match ext.as_str() {
        "csv" => to_csv_bytes(set)?,
        "parquet" | "pq" => to_parquet_bytes(set)?,
        _ => return Err(CleanError::UnsupportedFormat(path.to_path_buf())),
    };
    write_bytes_atomic(&bytes, path)
}

/// Write `bytes` to a temporary sibling of `path`, then rename it into place.
///
/// Missing parent directories are created. On failure the temporary file is
/// removed and `path` is left as it was.
pub fn write_bytes_atomic(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Render a record set as CSV: header row, no index column.
pub fn to_csv_bytes(set: &RecordSet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(set.columns())?;
    for row in set.rows() {
        writer.write_record(row.iter().map(render_cell))?;
    }
    writer
        .into_inner()
        .map_err(|e| CleanError::Io(e.into_error()))
}

/// Text form of a cell in CSV output.
///
/// Floats always carry a decimal point so they read back as floats; NaN and
/// null are empty fields.
pub fn render_cell(value: &CellValue) -> String {
    match value {
        CellValue::Integer(i) => i.to_string(),
        CellValue::Float(v) if v.is_nan() => String::new(),
        CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
            format!("{v:.1}")
        }
        CellValue::Float(v) => {
            let text = v.to_string();
            if v.is_finite() && !text.contains(['.', 'e']) {
                format!("{text}.0")
            } else {
                text
            }
        }
        CellValue::Bool(true) => "True".to_string(),
        CellValue::Bool(false) => "False".to_string(),
        CellValue::String(s) => s.clone(),
        CellValue::Null => String::new(),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Arrow type for a column, from the cells it holds.
fn column_type(set: &RecordSet, idx: usize) -> DataType {
    let (mut ints, mut floats, mut bools, mut text) = (false, false, false, false);
    for row in set.rows() {
        match &row[idx] {
            CellValue::Integer(_) => ints = true,
            CellValue::Float(_) => floats = true,
            CellValue::Bool(_) => bools = true,
            CellValue::String(_) => text = true,
            CellValue::Null => {}
        }
    }
    match (ints, floats, bools, text) {
        (_, _, _, true) => DataType::Utf8,
        (false, false, true, false) => DataType::Boolean,
        (true, false, false, false) => DataType::Int64,
        (_, _, false, false) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn build_array(set: &RecordSet, idx: usize, data_type: &DataType) -> ArrayRef {
    let cells = set.rows().iter().map(|row| &row[idx]);
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            cells
                .map(|c| match c {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            cells.map(CellValue::as_f64).collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            cells
                .map(|c| match c {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            cells
                .map(|c| match c {
                    CellValue::Null => None,
                    other => Some(render_cell(other)),
                })
                .collect::<Vec<_>>(),
        )),
    }
}

/// Render a record set as a single-row-group Parquet file.
pub fn to_parquet_bytes(set: &RecordSet) -> Result<Vec<u8>> {
    let types: Vec<DataType> = (0..set.columns().len())
        .map(|idx| column_type(set, idx))
        .collect();
    let schema = Arc::new(Schema::new(
        set.columns()
            .iter()
            .zip(&types)
            .map(|(name, ty)| Field::new(name, ty.clone(), true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = types
        .iter()
        .enumerate()
        .map(|(idx, ty)| build_array(set, idx, ty))
        .collect();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema.clone(), None)?;
    if !arrays.is_empty() {
        let batch = RecordBatch::try_new(schema, arrays)?;
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(buffer)
}
