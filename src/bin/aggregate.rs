//! Concatenate cleaned part files into one aggregated dataset.

use anyhow::{Context, Result};
use env_logger::Env;

use uwb_clean::config::AggregateConfig;
use uwb_clean::pipeline::run_aggregate;
use uwb_clean::storage::ObjectStore;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AggregateConfig::from_env().context("loading configuration")?;
    let store = config.upload.as_ref().map(|target| target.store());

    let summary = run_aggregate(&config, store.as_ref().map(|s| s as &dyn ObjectStore))
        .with_context(|| format!("aggregating files matching {}", config.input_pattern))?;

    log::info!(
        "aggregated dataset saved with {} rows",
        summary.output_shape.0
    );
    Ok(())
}
