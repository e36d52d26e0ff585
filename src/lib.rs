//! Cleaning pipeline for raw UWB channel-impulse-response measurements.
//!
//! Raw part files are pooled, stripped of administrative columns, extended
//! with per-row CIR statistics, purged of IQR outliers and duplicate rows,
//! and written out locally and optionally to an object store.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod storage;

pub use data::features::{derive_features, DeriveConfig, DerivedStat, SkewConvention};
pub use data::filter::{filter_rows, FilterConfig, FilterReport};
pub use data::model::{CellValue, RecordSet};
pub use error::{CleanError, Result};
pub use storage::{FsObjectStore, MemoryObjectStore, ObjectStore};
