use anyhow::{Context, Result};
use soundseek_etl::{fetch_and_store, Config, FetchTargets, FreesoundClient};

/// Search Freesound for `query` and download the previews.
pub async fn run_fetch(
    config: &Config,
    query: &str,
    max_results: usize,
    filter_tag: Option<String>,
    overwrite: bool,
) -> Result<()> {
    let client = FreesoundClient::from_config(config)
        .context("Cannot fetch without a Freesound API key")?;
    let targets = FetchTargets::from_config(config).with_overwrite(overwrite);

    println!("\n🔎 Searching Freesound for '{query}'\n");
    println!("  Audio directory: {}", targets.audio_dir.display());
    if let Some(tag) = &filter_tag {
        println!("  Tag filter: {tag}");
    }
    println!();

    let report = fetch_and_store(&client, query, max_results, filter_tag.as_deref(), &targets)
        .await
        .context("Fetch failed")?;

    println!("✓ Fetch complete");
    println!("  Found: {}", report.found);
    println!("  Downloaded: {}", report.downloaded);
    if report.skipped > 0 {
        println!("  Without preview: {}", report.skipped);
    }
    if report.failed > 0 {
        println!("  Failed: {}", report.failed);
    }
    if report.downloaded > 0 {
        println!("\nRun 'soundseek extract' to analyse the new audio");
    }

    Ok(())
}
