//! Search Freesound, download previews, and record what was found.

use std::path::PathBuf;

use soundseek_core::schema::Database;
use treadle::{Stage, StageContext, StageOutcome};

use crate::config::Config;
use crate::error::FetchResult;
use crate::freesound::FreesoundClient;
use crate::metadata::MetadataLog;

/// Where fetched data is written.
#[derive(Debug, Clone)]
pub struct FetchTargets {
    pub audio_dir: PathBuf,
    pub metadata: MetadataLog,
    pub db_path: PathBuf,
    /// Re-download previews that already exist on disk.
    pub overwrite: bool,
}

impl FetchTargets {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let layout = config.layout();
        Self {
            audio_dir: layout.audio_dir,
            metadata: MetadataLog::new(layout.metadata_path),
            db_path: config.database_path(),
            overwrite: false,
        }
    }

    #[must_use]
    pub const fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of one `fetch_and_store` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Search results returned.
    pub found: usize,
    /// Previews present on disk afterwards (downloaded or reused).
    pub downloaded: usize,
    /// Results without a usable preview.
    pub skipped: usize,
    /// Downloads that failed.
    pub failed: usize,
}

/// Search, download and save metadata for a batch of samples.
///
/// Download failures are logged and counted; they never abort the batch.
/// Every search result is appended to the metadata log and upserted into
/// the catalog.
pub async fn fetch_and_store(
    client: &FreesoundClient,
    query: &str,
    max_results: usize,
    filter_tag: Option<&str>,
    targets: &FetchTargets,
) -> FetchResult<FetchReport> {
    let samples = client.search_samples(query, max_results, filter_tag).await?;

    let mut report = FetchReport {
        found: samples.len(),
        ..FetchReport::default()
    };

    let mut local_paths = Vec::with_capacity(samples.len());
    for sample in &samples {
        let path = match client
            .download_sample(sample, &targets.audio_dir, targets.overwrite)
            .await
        {
            Ok(Some(path)) => {
                report.downloaded += 1;
                Some(path)
            }
            Ok(None) => {
                report.skipped += 1;
                None
            }
            Err(e) => {
                log::error!("Failed to download {}: {}", sample.file_name(), e);
                report.failed += 1;
                None
            }
        };
        local_paths.push(path);
    }

    targets.metadata.append(&samples)?;

    let db = Database::open(&targets.db_path)?;
    for (sample, path) in samples.iter().zip(local_paths) {
        db.upsert_sample(&sample.to_catalog_sample(query, path))?;
    }

    log::info!(
        "Fetch complete for '{}': {} found, {} downloaded, {} skipped, {} failed",
        query,
        report.found,
        report.downloaded,
        report.skipped,
        report.failed
    );

    Ok(report)
}

/// The Fetch stage: run `fetch_and_store` for one query.
#[derive(Debug)]
pub struct FetchStage {
    client: FreesoundClient,
    query: String,
    max_results: usize,
    filter_tag: Option<String>,
    targets: FetchTargets,
}

impl FetchStage {
    #[must_use]
    pub fn new(
        client: FreesoundClient,
        query: impl Into<String>,
        max_results: usize,
        targets: FetchTargets,
    ) -> Self {
        Self {
            client,
            query: query.into(),
            max_results,
            filter_tag: None,
            targets,
        }
    }

    #[must_use]
    pub fn with_filter_tag(mut self, tag: Option<String>) -> Self {
        self.filter_tag = tag;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait::async_trait]
impl Stage for FetchStage {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Starting fetch for '{}'", self.query);

        match fetch_and_store(
            &self.client,
            &self.query,
            self.max_results,
            self.filter_tag.as_deref(),
            &self.targets,
        )
        .await
        {
            Ok(report) => {
                log::info!("Fetch stage complete: {} samples found", report.found);
                Ok(StageOutcome::Complete)
            }
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Fetch failed: {e}"
            ))),
        }
    }
}
