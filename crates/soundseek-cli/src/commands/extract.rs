use anyhow::{Context, Result};
use soundseek_etl::{Config, ExtractStage};

/// Extract features from every downloaded preview.
pub fn run_extract(config: &Config, limit: Option<usize>) -> Result<()> {
    let layout = config.layout();
    println!("\n🎛️  Extracting audio features\n");
    println!("  Audio directory: {}", layout.audio_dir.display());
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!();

    let report = ExtractStage::from_config(config)
        .with_limit(limit)
        .run()
        .context("Feature extraction failed")?;

    println!("✓ Extracted features for {} files", report.records.len());
    if !report.failed.is_empty() {
        println!("  Failed: {}", report.failed.len());
        for path in &report.failed {
            println!("    ✗ {}", path.display());
        }
    }
    if !report.records.is_empty() {
        println!("  Features table: {}", layout.features_path.display());
    }

    Ok(())
}
