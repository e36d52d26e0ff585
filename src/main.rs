use anyhow::{Context, Result};
use env_logger::Env;

use uwb_clean::config::CleanConfig;
use uwb_clean::pipeline::run_clean;
use uwb_clean::storage::ObjectStore;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Configuration problems abort before any file is touched.
    let config = CleanConfig::from_env().context("loading configuration")?;
    let store = config.upload.as_ref().map(|target| target.store());

    let summary = run_clean(&config, store.as_ref().map(|s| s as &dyn ObjectStore))
        .with_context(|| format!("cleaning files matching {}", config.input_pattern))?;

    log::info!("run summary: {}", serde_json::to_string(&summary)?);
    Ok(())
}
