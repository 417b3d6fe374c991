use anyhow::{Context, Result};
use soundseek_etl::{Config, IndexStage};

/// Build the search index from the features table.
pub fn run_index(config: &Config, normalize: bool) -> Result<()> {
    let stage = IndexStage::from_config(config, super::normalization(normalize));
    let engine = stage.run().context("Failed to build the search index")?;

    println!("\n✓ Indexed {} samples ({} features each)", engine.len(), engine.index().dim());
    println!("  Index: {}", stage.index_path().display());
    Ok(())
}
