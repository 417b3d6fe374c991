use std::path::PathBuf;

use soundseek_search::{FeatureTable, Normalization, SearchEngine, DEFAULT_EXCLUDED_COLUMNS};
use treadle::{Stage, StageContext, StageOutcome};

use crate::config::Config;

/// The Index stage: load the features table, build the L2 index and
/// persist it next to the table.
#[derive(Debug)]
pub struct IndexStage {
    features_path: PathBuf,
    index_path: PathBuf,
    normalization: Normalization,
}

impl IndexStage {
    #[must_use]
    pub fn new(features_path: PathBuf, index_path: PathBuf, normalization: Normalization) -> Self {
        Self {
            features_path,
            index_path,
            normalization,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, normalization: Normalization) -> Self {
        let layout = config.layout();
        Self::new(layout.features_path, layout.index_path, normalization)
    }

    /// Where the index is written for this stage's normalisation.
    pub fn index_path(&self) -> PathBuf {
        self.normalization.index_path(&self.index_path)
    }

    /// Build and save the index.
    pub fn run(&self) -> soundseek_search::Result<SearchEngine> {
        let index_path = self.index_path();
        match self.normalization {
            Normalization::None => SearchEngine::new(
                &self.features_path,
                Some(&index_path),
                &DEFAULT_EXCLUDED_COLUMNS,
            ),
            Normalization::ZScore => {
                let table = FeatureTable::from_csv(&self.features_path, &DEFAULT_EXCLUDED_COLUMNS)?;
                let engine = SearchEngine::from_table(table, self.normalization)?;
                engine.index().save(&index_path)?;
                Ok(engine)
            }
        }
    }
}

#[async_trait::async_trait]
impl Stage for IndexStage {
    fn name(&self) -> &str {
        "index"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Indexing features from {}", self.features_path.display());

        match self.run() {
            Ok(engine) => {
                log::info!(
                    "Index complete: {} vectors of dimension {}",
                    engine.len(),
                    engine.index().dim()
                );
                Ok(StageOutcome::Complete)
            }
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Index failed: {e}"
            ))),
        }
    }
}
