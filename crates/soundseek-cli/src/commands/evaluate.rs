use anyhow::{Context, Result};
use soundseek_core::schema::Database;
use soundseek_etl::Config;
use soundseek_search::{evaluate_classifier, evaluate_retrieval, KnnTagClassifier, SearchEngine};

/// Score retrieval and tag classification against the Freesound tags.
pub fn run_evaluate(config: &Config, k: usize, normalize: bool) -> Result<()> {
    let layout = config.layout();
    let normalization = super::normalization(normalize);

    let db = Database::open(config.database_path())?;
    let labels = db.tag_labels()?;
    if labels.is_empty() {
        anyhow::bail!("No tagged samples in the catalog; run 'soundseek fetch' first");
    }

    let engine = SearchEngine::open(
        &layout.features_path,
        &normalization.index_path(&layout.index_path),
        normalization,
    )
    .context("Failed to open the search index")?;

    let retrieval = evaluate_retrieval(&engine, &labels, k)?;
    let classifier = evaluate_classifier(&engine, &labels, &KnnTagClassifier::new(k))?;

    println!("\n📈 Evaluation ({normalization:?} features, k = {k})\n");
    println!("  Retrieval");
    println!("    Queries: {}", retrieval.queries);
    println!("    MRR: {:.4}", retrieval.mrr);
    println!("    Precision@{}: {:.4}", retrieval.k, retrieval.precision_at_k);
    println!("  Tag classifier");
    println!("    Samples: {}", classifier.samples);
    println!("    Macro F1: {:.4}", classifier.macro_f1);

    Ok(())
}
