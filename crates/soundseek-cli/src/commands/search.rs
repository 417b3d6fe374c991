use anyhow::{Context, Result};
use soundseek_etl::Config;
use soundseek_search::SearchEngine;

/// Print the `k` samples most similar to `file_name`.
pub fn run_search(config: &Config, file_name: &str, k: usize, normalize: bool) -> Result<()> {
    let layout = config.layout();
    let normalization = super::normalization(normalize);
    let engine = SearchEngine::open(
        &layout.features_path,
        &normalization.index_path(&layout.index_path),
        normalization,
    )
    .with_context(|| format!("Failed to open features at {}", layout.features_path.display()))?;

    let hits = engine.query_by_sample(file_name, k)?;

    println!("\n🎧 Samples similar to {file_name}\n");
    if hits.is_empty() {
        println!("  No other samples indexed");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        let tempo = hit.metadata.get("tempo_bpm").map_or("?", String::as_str);
        println!(
            "  {:>2}. {}  (tempo {} BPM, distance {:.4})",
            rank + 1,
            hit.file_name,
            tempo,
            hit.distance
        );
    }

    Ok(())
}
