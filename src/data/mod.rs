/// Data layer: core types, loading, feature derivation and row filtering.
///
/// Architecture:
/// ```text
///  uwb_dataset_part*.csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → RecordSet (sorted, concatenated)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ features  │  drop admin columns, append CIR_MEAN / VAR / SKEW / ENERGY
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  IQR outlier vote → drop duplicates
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  RecordSet → .csv / .parquet bytes
///   └──────────┘
/// ```

pub mod features;
pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
