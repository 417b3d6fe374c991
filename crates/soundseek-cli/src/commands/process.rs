use anyhow::{Context, Result};
use soundseek_etl::{build_local_pipeline, build_pipeline, Config, SampleBatch};

/// Run the whole pipeline as one treadle workflow.
///
/// With a query: fetch -> extract -> index. Without one, only the audio
/// already on disk is processed. `resume` keys the run by its query so
/// stages that already completed for it are skipped.
pub async fn run_process(
    config: &Config,
    query: Option<String>,
    max_results: usize,
    filter_tag: Option<String>,
    resume: bool,
) -> Result<()> {
    println!("\n🎵 SoundSeek Processing Pipeline\n");
    match &query {
        Some(query) => println!("  Query: {query}"),
        None => println!("  Query: none (local audio only)"),
    }
    println!("  Data directory: {}", config.data_dir.display());
    println!("  Database: {}", config.database_path().display());
    println!();

    let workflow = match &query {
        Some(query) => build_pipeline(config, query, max_results, filter_tag.as_deref()),
        None => build_local_pipeline(config),
    }
    .context("Failed to build pipeline")?;

    let state_path = config.data_dir.join("pipeline.db");
    let mut store = treadle::SqliteStateStore::open(&state_path)
        .await
        .context("Failed to open pipeline state store")?;

    let work_item = match (&query, resume) {
        (Some(query), true) => SampleBatch::for_query(query),
        (query, _) => SampleBatch::fresh(query.as_deref()),
    };
    log::info!("Processing work item {work_item}");

    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  ⏳ [{stage}] Starting...");
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    workflow
        .advance(&work_item, &mut store)
        .await
        .context("Pipeline execution failed")?;

    println!("\n✓ Processing pipeline complete!");
    println!("\nNext steps:");
    println!("  - Run 'soundseek search <file_name>' to find similar samples");
    println!("  - Run 'soundseek evaluate' to score the index against tags");

    Ok(())
}
