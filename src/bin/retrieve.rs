//! Download the processed dataset from the bucket to the local data folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::Env;

use uwb_clean::config::{retrieve_target_from_env, DEFAULT_OUTPUT_PATH, ENV_OUTPUT_PATH};
use uwb_clean::pipeline::run_retrieve;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let target = retrieve_target_from_env().context("loading configuration")?;
    let destination: PathBuf = std::env::var(ENV_OUTPUT_PATH)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string())
        .into();

    let store = target.store();
    let size = run_retrieve(&store, &target.key, &destination)
        .with_context(|| format!("downloading {} from {}", target.key, target.bucket))?;
    log::info!("{size} bytes written");
    Ok(())
}
