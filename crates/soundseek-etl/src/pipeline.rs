use soundseek_search::Normalization;
use treadle::Workflow;

use crate::config::Config;
use crate::fetch::{FetchStage, FetchTargets};
use crate::freesound::FreesoundClient;
use crate::{ExtractStage, IndexStage};

/// Build the fetch -> extract -> index pipeline for one query, optionally
/// restricted to samples carrying `filter_tag`.
///
/// # Errors
/// Returns an error if no Freesound API key is configured or the workflow
/// cannot be built.
pub fn build_pipeline(
    config: &Config,
    query: &str,
    max_results: usize,
    filter_tag: Option<&str>,
) -> treadle::Result<Workflow> {
    let client = FreesoundClient::from_config(config).map_err(|e| {
        treadle::TreadleError::InvalidWorkflow(format!("Failed to create fetch stage: {e}"))
    })?;
    let fetch_stage = FetchStage::new(client, query, max_results, FetchTargets::from_config(config))
        .with_filter_tag(filter_tag.map(str::to_string));

    Workflow::builder()
        .stage("fetch", fetch_stage)
        .stage("extract", ExtractStage::from_config(config))
        .stage("index", IndexStage::from_config(config, Normalization::default()))
        .dependency("extract", "fetch")
        .dependency("index", "extract")
        .build()
}

/// Build the extract -> index pipeline over audio already on disk.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_local_pipeline(config: &Config) -> treadle::Result<Workflow> {
    Workflow::builder()
        .stage("extract", ExtractStage::from_config(config))
        .stage("index", IndexStage::from_config(config, Normalization::default()))
        .dependency("index", "extract")
        .build()
}
