use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::index::{FlatL2Index, Neighbor};
use crate::table::{FeatureTable, DEFAULT_EXCLUDED_COLUMNS};

/// How feature columns are scaled before indexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// Raw feature values.
    #[default]
    None,
    /// Per-column standardisation to zero mean and unit variance.
    ZScore,
}

impl Normalization {
    /// Where an index built with this normalisation is saved, given the
    /// location of the raw index.
    pub fn index_path(self, base: &Path) -> PathBuf {
        match self {
            Self::None => base.to_path_buf(),
            Self::ZScore => base.with_extension("zscore.json"),
        }
    }
}

/// Per-column mean and standard deviation.
#[derive(Debug, Clone)]
struct ColumnStats {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl ColumnStats {
    #[allow(clippy::cast_precision_loss)]
    fn from_vectors(vectors: &[Vec<f32>], dim: usize) -> Self {
        let n = vectors.len().max(1) as f64;
        let mut mean = vec![0.0f64; dim];
        for v in vectors {
            for (m, x) in mean.iter_mut().zip(v) {
                *m += f64::from(*x);
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut var = vec![0.0f64; dim];
        for v in vectors {
            for ((s, x), m) in var.iter_mut().zip(v).zip(&mean) {
                *s += (f64::from(*x) - m).powi(2);
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let to_f32 = |x: f64| x as f32;
        Self {
            mean: mean.iter().copied().map(to_f32).collect(),
            std: var.iter().map(|s| to_f32((s / n).sqrt())).collect(),
        }
    }

    /// Constant columns are only centred.
    fn apply(&self, vector: &[f32]) -> Vec<f32> {
        vector
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| if *s > 0.0 { (x - m) / s } else { x - m })
            .collect()
    }
}

/// A neighbour of a query sample with its row from the features table.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub file_name: String,
    pub distance: f32,
    pub metadata: BTreeMap<String, String>,
}

/// Nearest-neighbour search over the features table.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    table: FeatureTable,
    index: FlatL2Index,
    normalization: Normalization,
    stats: Option<ColumnStats>,
}

impl SearchEngine {
    /// Load `features_path`, build the index and save it to `index_path`
    /// when given.
    pub fn new(
        features_path: &Path,
        index_path: Option<&Path>,
        exclude_columns: &[&str],
    ) -> Result<Self> {
        let table = FeatureTable::from_csv(features_path, exclude_columns)?;
        let engine = Self::from_table(table, Normalization::None)?;
        if let Some(path) = index_path {
            engine.index.save(path)?;
        }
        Ok(engine)
    }

    /// Load `features_path` and reuse the index saved at `index_path` when
    /// it matches the table's size and dimension. Otherwise the index is
    /// rebuilt and saved.
    pub fn open(
        features_path: &Path,
        index_path: &Path,
        normalization: Normalization,
    ) -> Result<Self> {
        let table = FeatureTable::from_csv(features_path, &DEFAULT_EXCLUDED_COLUMNS)?;
        let stats = Self::stats_for(&table, normalization);

        if index_path.exists() {
            match FlatL2Index::load(index_path) {
                Ok(index) if index.len() == table.len() && index.dim() == table.dim() => {
                    log::info!("Reusing index at {}", index_path.display());
                    return Ok(Self {
                        table,
                        index,
                        normalization,
                        stats,
                    });
                }
                Ok(_) => log::info!("Index at {} is stale; rebuilding", index_path.display()),
                Err(e) => log::warn!("Failed to load index {}: {}", index_path.display(), e),
            }
        }

        let engine = Self::from_table(table, normalization)?;
        engine.index.save(index_path)?;
        Ok(engine)
    }

    /// Index an already loaded table.
    pub fn from_table(table: FeatureTable, normalization: Normalization) -> Result<Self> {
        log::info!("Building L2 index over {} vectors", table.len());

        let stats = Self::stats_for(&table, normalization);
        let mut index = FlatL2Index::new(table.dim());
        for vector in table.vectors() {
            match &stats {
                Some(stats) => index.add(&stats.apply(vector))?,
                None => index.add(vector)?,
            }
        }

        Ok(Self {
            table,
            index,
            normalization,
            stats,
        })
    }

    fn stats_for(table: &FeatureTable, normalization: Normalization) -> Option<ColumnStats> {
        match normalization {
            Normalization::None => None,
            Normalization::ZScore => Some(ColumnStats::from_vectors(table.vectors(), table.dim())),
        }
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub const fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Nearest rows to a raw feature vector (scaled like the index).
    pub fn query_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        match &self.stats {
            Some(stats) => {
                if vector.len() != self.index.dim() {
                    return Err(SearchError::DimensionMismatch {
                        expected: self.index.dim(),
                        actual: vector.len(),
                    });
                }
                self.index.search(&stats.apply(vector), k)
            }
            None => self.index.search(vector, k),
        }
    }

    /// The `k` samples most similar to `file_name`, excluding itself.
    pub fn query_by_sample(&self, file_name: &str, k: usize) -> Result<Vec<SearchHit>> {
        let row = self
            .table
            .position(file_name)
            .ok_or_else(|| SearchError::SampleNotFound(file_name.to_string()))?;
        let vector = self
            .table
            .vector(row)
            .ok_or_else(|| SearchError::SampleNotFound(file_name.to_string()))?;

        let hits = self
            .query_by_vector(vector, k.saturating_add(1))?
            .into_iter()
            .filter_map(|n| {
                let name = self.table.file_name(n.index)?;
                (name != file_name).then(|| SearchHit {
                    file_name: name.to_string(),
                    distance: n.distance,
                    metadata: self.table.metadata(n.index),
                })
            })
            .take(k)
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV: &str = "file_name,file_path,tempo_bpm,estimated_key,spectral_centroid\n\
                       a.mp3,/a.mp3,100,C,1000\n\
                       b.mp3,/b.mp3,101,D,1010\n\
                       c.mp3,/c.mp3,140,E,5000\n\
                       d.mp3,/d.mp3,99,F,995\n";

    fn features(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("features.csv");
        std::fs::write(&path, CSV).unwrap();
        path
    }

    #[test]
    fn test_query_by_sample_excludes_self() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SearchEngine::new(&features(&temp_dir), None, &DEFAULT_EXCLUDED_COLUMNS).unwrap();

        let hits = engine.query_by_sample("a.mp3", 2).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.file_name.as_str()).collect();
        assert_eq!(names, vec!["d.mp3", "b.mp3"]);
        assert_eq!(hits[0].distance, 26.0);
        assert_eq!(hits[0].metadata["estimated_key"], "F");
    }

    #[test]
    fn test_query_by_sample_k_larger_than_table() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SearchEngine::new(&features(&temp_dir), None, &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        assert_eq!(engine.query_by_sample("c.mp3", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_sample() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SearchEngine::new(&features(&temp_dir), None, &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        let err = engine.query_by_sample("zzz.mp3", 3).unwrap_err();
        assert!(matches!(err, SearchError::SampleNotFound(ref n) if n == "zzz.mp3"));
        assert_eq!(err.to_string(), "Sample not found: zzz.mp3");
    }

    #[test]
    fn test_query_by_sample_unbounded_k() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SearchEngine::new(&features(&temp_dir), None, &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        let hits = engine.query_by_sample("a.mp3", usize::MAX).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].file_name, "d.mp3");
    }

    #[test]
    fn test_query_by_vector() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SearchEngine::new(&features(&temp_dir), None, &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        let hits = engine.query_by_vector(&[140.0, 5000.0], 1).unwrap();
        assert_eq!(hits[0].index, 2);
        assert_eq!(hits[0].distance, 0.0);
        assert!(engine.query_by_vector(&[1.0], 1).is_err());
    }

    #[test]
    fn test_new_saves_index() {
        let temp_dir = TempDir::new().unwrap();
        let index_path = temp_dir.path().join("index.json");
        SearchEngine::new(&features(&temp_dir), Some(&index_path), &DEFAULT_EXCLUDED_COLUMNS).unwrap();

        let index = FlatL2Index::load(&index_path).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), 2);
    }

    #[test]
    fn test_open_reuses_matching_index_and_rebuilds_stale() {
        let temp_dir = TempDir::new().unwrap();
        let features_path = features(&temp_dir);
        let index_path = temp_dir.path().join("index.json");

        let mut planted = FlatL2Index::new(2);
        for _ in 0..4 {
            planted.add(&[0.0, 0.0]).unwrap();
        }
        planted.save(&index_path).unwrap();
        let reused = SearchEngine::open(&features_path, &index_path, Normalization::None).unwrap();
        assert_eq!(reused.index(), &planted);

        let mut stale = FlatL2Index::new(2);
        stale.add(&[0.0, 0.0]).unwrap();
        stale.save(&index_path).unwrap();
        let rebuilt = SearchEngine::open(&features_path, &index_path, Normalization::None).unwrap();
        assert_eq!(rebuilt.index().len(), 4);
        assert_eq!(FlatL2Index::load(&index_path).unwrap().len(), 4);
    }

    #[test]
    fn test_zscore_balances_columns() {
        let temp_dir = TempDir::new().unwrap();
        let table = FeatureTable::from_csv(&features(&temp_dir), &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        let engine = SearchEngine::from_table(table, Normalization::ZScore).unwrap();
        assert_eq!(engine.normalization(), Normalization::ZScore);

        for column in 0..2 {
            let mean: f32 = (0..4)
                .map(|row| engine.index().vector(row).unwrap()[column])
                .sum::<f32>()
                / 4.0;
            assert!(mean.abs() < 1e-4);
        }
        let hits = engine.query_by_sample("a.mp3", 1).unwrap();
        assert_eq!(hits[0].file_name, "d.mp3");
    }

    #[test]
    fn test_normalized_index_path() {
        let base = Path::new("data/processed/index.json");
        assert_eq!(Normalization::None.index_path(base), base);
        assert_eq!(
            Normalization::ZScore.index_path(base),
            Path::new("data/processed/index.zscore.json")
        );
    }
}
