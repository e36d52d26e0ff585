use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{AggregateConfig, CleanConfig};
use crate::data::features::derive_features;
use crate::data::filter::{filter_rows, FilterReport};
use crate::data::loader::{load_many, resolve_pattern};
use crate::data::model::RecordSet;
use crate::data::writer::{to_csv_bytes, write_bytes_atomic, write_file, CSV_CONTENT_TYPE};
use crate::error::{CleanError, Result};
use crate::storage::ObjectStore;

/// What a cleaning run did, for the final log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSummary {
    pub input_files: Vec<PathBuf>,
    pub raw_shape: (usize, usize),
    pub derived_shape: (usize, usize),
    pub filter: FilterReport,
    pub output_shape: (usize, usize),
    pub output_path: PathBuf,
    pub uploaded_to: Option<String>,
}

/// What an aggregation run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub input_files: Vec<PathBuf>,
    pub output_shape: (usize, usize),
    pub output_path: PathBuf,
    pub uploaded_to: Option<String>,
}

fn resolve_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = resolve_pattern(pattern)?;
    if files.is_empty() {
        return Err(CleanError::NoInputFiles(pattern.to_string()));
    }
    Ok(files)
}

/// Output of [`clean`]: the cleaned table plus what each stage saw.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub table: RecordSet,
    pub derived_shape: (usize, usize),
    pub report: FilterReport,
}

/// Feature deriver followed by row filter, with no I/O.
pub fn clean(raw: &RecordSet, config: &CleanConfig) -> Result<Cleaned> {
    let derived = derive_features(raw, &config.derive)?;
    log::info!("shape after deriving CIR features: {:?}", derived.shape());
    let (table, report) = filter_rows(&derived, &config.filter)?;
    Ok(Cleaned {
        table,
        derived_shape: derived.shape(),
        report,
    })
}

/// Write `set` to `path` and, with a store, upload the same CSV under `key`.
fn publish(
    set: &RecordSet,
    path: &Path,
    store: Option<(&dyn ObjectStore, &str)>,
) -> Result<Option<String>> {
    write_file(set, path)?;
    log::info!("saved {:?} table to {}", set.shape(), path.display());

    let Some((store, key)) = store else {
        return Ok(None);
    };
    store.put(key, &to_csv_bytes(set)?, CSV_CONTENT_TYPE)?;
    let location = store.location(key);
    log::info!("table uploaded to {location}");
    Ok(Some(location))
}

/// Load every raw part file, clean the pooled table and publish it.
///
/// Every file is loaded and every stage finishes before anything is written,
/// so a failure anywhere leaves no output.
pub fn run_clean(
    config: &CleanConfig,
    store: Option<&dyn ObjectStore>,
) -> Result<CleanSummary> {
    let files = resolve_inputs(&config.input_pattern)?;
    let raw = load_many(&files)?;
    log::info!(
        "aggregated {} raw files, initial shape: {:?}",
        files.len(),
        raw.shape()
    );

    let Cleaned {
        table: cleaned,
        derived_shape,
        report,
    } = clean(&raw, config)?;
    log::info!("final cleaned shape: {:?}", cleaned.shape());

    let key = config.upload.as_ref().map(|u| u.key.as_str());
    let uploaded_to = publish(&cleaned, &config.output_path, store.zip(key))?;

    Ok(CleanSummary {
        input_files: files,
        raw_shape: raw.shape(),
        derived_shape,
        filter: report,
        output_shape: cleaned.shape(),
        output_path: config.output_path.clone(),
        uploaded_to,
    })
}

/// Concatenate already-cleaned part files into one table and publish it.
pub fn run_aggregate(
    config: &AggregateConfig,
    store: Option<&dyn ObjectStore>,
) -> Result<AggregateSummary> {
    let files = resolve_inputs(&config.input_pattern)?;
    let aggregated = load_many(&files)?;
    log::info!(
        "aggregated {} cleaned files into {} rows",
        files.len(),
        aggregated.len()
    );

    let key = config.upload.as_ref().map(|u| u.key.as_str());
    let uploaded_to = publish(&aggregated, &config.output_path, store.zip(key))?;

    Ok(AggregateSummary {
        input_files: files,
        output_shape: aggregated.shape(),
        output_path: config.output_path.clone(),
        uploaded_to,
    })
}

/// Download `key` from `store` into `destination`.
///
/// The download lands under a temporary name and is renamed into place, so an
/// existing `destination` is either kept or fully replaced.
pub fn run_retrieve(store: &dyn ObjectStore, key: &str, destination: &Path) -> Result<u64> {
    let bytes = store.get(key)?;
    write_bytes_atomic(&bytes, destination)?;
    log::info!(
        "file {} downloaded to {}",
        store.location(key),
        destination.display()
    );
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::{DeriveConfig, ADMIN_COLUMNS, CIR_LEN};
    use crate::data::filter::FilterConfig;
    use crate::data::model::CellValue;
    use crate::storage::MemoryObjectStore;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn no_matching_files_is_an_error() {
        let temp = tempdir().unwrap();
        let config = AggregateConfig {
            input_pattern: temp.path().join("*.csv").to_str().unwrap().to_string(),
            output_path: temp.path().join("out.csv"),
            upload: None,
        };
        let err = run_aggregate(&config, None).unwrap_err();
        assert!(matches!(err, CleanError::NoInputFiles(_)));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn retrieve_writes_the_object_locally() {
        let temp = tempdir().unwrap();
        let store = MemoryObjectStore::new("bucket");
        store.put("aggregated_dataset.csv", b"a\n1\n", "text/csv").unwrap();

        let destination = temp.path().join("processed").join("aggregated_dataset.csv");
        let size = run_retrieve(&store, "aggregated_dataset.csv", &destination).unwrap();
        assert_eq!(size, 4);
        assert_eq!(fs::read(&destination).unwrap(), b"a\n1\n");
    }

    #[test]
    fn retrieve_replaces_an_existing_download() {
        let temp = tempdir().unwrap();
        let store = MemoryObjectStore::new("bucket");
        store.put("aggregated_dataset.csv", b"a\n2\n", "text/csv").unwrap();

        let destination = temp.path().join("aggregated_dataset.csv");
        fs::write(&destination, b"a\n1\n1\n1\n").unwrap();
        run_retrieve(&store, "aggregated_dataset.csv", &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"a\n2\n");
        assert!(!temp.path().join("aggregated_dataset.csv.tmp").exists());
    }

    #[test]
    fn clean_reports_the_derived_shape() {
        let mut columns: Vec<String> = vec!["RANGE".into()];
        columns.extend(ADMIN_COLUMNS.iter().map(|c| c.to_string()));
        columns.extend((0..CIR_LEN).map(|i| format!("CIR{i}")));
        let row = |r: f64| {
            let mut row = vec![CellValue::Float(r)];
            row.extend(ADMIN_COLUMNS.iter().map(|_| CellValue::Integer(1)));
            row.extend((0..CIR_LEN).map(|i| CellValue::Float(i as f64)));
            row
        };
        let raw = RecordSet::from_rows(columns, vec![row(1.0), row(2.0), row(1.0)]).unwrap();
        let config = CleanConfig {
            input_pattern: String::new(),
            output_path: PathBuf::new(),
            derive: DeriveConfig::default(),
            filter: FilterConfig {
                features: vec!["RANGE".into()],
                vote_threshold: 1,
                ..FilterConfig::default()
            },
            upload: None,
        };

        let cleaned = clean(&raw, &config).unwrap();
        assert_eq!(cleaned.derived_shape, (3, 1 + CIR_LEN + 4));
        assert_eq!(cleaned.report.duplicate_rows, 1);
        assert_eq!(cleaned.table.shape(), (2, 1 + CIR_LEN + 4));
    }

    #[test]
    fn retrieve_of_missing_object_creates_nothing() {
        let temp = tempdir().unwrap();
        let store = MemoryObjectStore::new("bucket");
        let destination = temp.path().join("x.csv");
        assert!(run_retrieve(&store, "x.csv", &destination).is_err());
        assert!(!destination.exists());
    }
}
