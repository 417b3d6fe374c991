use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use soundseek_core::model::FeatureRecord;

use crate::error::{Result, SearchError};

/// Columns left out of the feature vector by default.
pub const DEFAULT_EXCLUDED_COLUMNS: [&str; 3] = FeatureRecord::NON_NUMERIC_COLUMNS;

/// The features table: every row's raw values plus its numeric feature
/// vector.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    feature_columns: Vec<String>,
    vectors: Vec<Vec<f32>>,
    file_name_column: usize,
}

impl FeatureTable {
    /// Load a features CSV.
    ///
    /// The feature vector holds every column not in `exclude_columns`
    /// whose values all parse as numbers, in file order.
    pub fn from_csv(path: &Path, exclude_columns: &[&str]) -> Result<Self> {
        log::info!("Loading features from {}", path.display());

        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|record| record.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, _>>()?;

        let table = Self::from_rows(path.to_path_buf(), columns, rows, exclude_columns)?;
        log::info!(
            "Loaded {} samples with {} features.",
            table.len(),
            table.dim()
        );
        Ok(table)
    }

    /// Build a table from extracted records with the default exclusions.
    pub fn from_records(records: &[FeatureRecord]) -> Result<Self> {
        let columns = FeatureRecord::COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let rows = records.iter().map(FeatureRecord::to_row).collect();
        Self::from_rows(PathBuf::from("<records>"), columns, rows, &DEFAULT_EXCLUDED_COLUMNS)
    }

    fn from_rows(
        source: PathBuf,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        exclude_columns: &[&str],
    ) -> Result<Self> {
        let file_name_column = columns
            .iter()
            .position(|c| c == "file_name")
            .ok_or_else(|| SearchError::MissingColumn {
                path: source.clone(),
                column: "file_name",
            })?;
        if rows.is_empty() {
            return Err(SearchError::EmptyTable(source));
        }

        let numeric: Vec<usize> = (0..columns.len())
            .filter(|&i| !exclude_columns.contains(&columns[i].as_str()))
            .filter(|&i| {
                rows.iter()
                    .all(|row| row.get(i).is_some_and(|v| v.trim().parse::<f32>().is_ok()))
            })
            .collect();
        if numeric.is_empty() {
            return Err(SearchError::NoFeatureColumns(source));
        }

        let vectors = rows
            .iter()
            .map(|row| {
                numeric
                    .iter()
                    .map(|&i| row[i].trim().parse::<f32>().unwrap_or_default())
                    .collect()
            })
            .collect();
        let feature_columns = numeric.iter().map(|&i| columns[i].clone()).collect();

        Ok(Self {
            columns,
            rows,
            feature_columns,
            vectors,
            file_name_column,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature vector dimension.
    pub fn dim(&self) -> usize {
        self.feature_columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        self.vectors.get(row).map(Vec::as_slice)
    }

    pub fn file_name(&self, row: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(self.file_name_column))
            .map(String::as_str)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .filter_map(|r| r.get(self.file_name_column).map(String::as_str))
    }

    /// Row index of the first row with this file name.
    pub fn position(&self, file_name: &str) -> Option<usize> {
        self.file_names().position(|n| n == file_name)
    }

    /// Column name to raw value for one row.
    pub fn metadata(&self, row: usize) -> BTreeMap<String, String> {
        self.rows
            .get(row)
            .map(|values| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("features.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_numeric_columns_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(
            &temp_dir,
            "file_name,file_path,tempo_bpm,estimated_key,mood,spectral_centroid\n\
             a.mp3,/x/a.mp3,120,C,dark,1000.5\n\
             b.mp3,/x/b.mp3,90,A,bright,2000\n",
        );

        let table = FeatureTable::from_csv(&path, &DEFAULT_EXCLUDED_COLUMNS).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.feature_columns(), ["tempo_bpm", "spectral_centroid"]);
        assert_eq!(table.vector(1).unwrap(), [90.0, 2000.0]);
        assert_eq!(table.file_name(0), Some("a.mp3"));
        assert_eq!(table.metadata(0)["mood"], "dark");
    }

    #[test]
    fn test_custom_exclusions() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(&temp_dir, "file_name,a,b\nx.wav,1,2\n");
        let table = FeatureTable::from_csv(&path, &["file_name", "a"]).unwrap();
        assert_eq!(table.feature_columns(), ["b"]);
    }

    #[test]
    fn test_missing_file_name_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(&temp_dir, "name,a\nx.wav,1\n");
        let err = FeatureTable::from_csv(&path, &DEFAULT_EXCLUDED_COLUMNS).unwrap_err();
        assert!(matches!(err, SearchError::MissingColumn { column: "file_name", .. }));
    }

    #[test]
    fn test_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(&temp_dir, "file_name,a\n");
        let err = FeatureTable::from_csv(&path, &DEFAULT_EXCLUDED_COLUMNS).unwrap_err();
        assert!(matches!(err, SearchError::EmptyTable(_)));
    }

    #[test]
    fn test_missing_file() {
        let result = FeatureTable::from_csv(Path::new("/nonexistent/features.csv"), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_records_matches_numeric_vector() {
        let record = FeatureRecord {
            file_name: "1_pad.mp3".to_string(),
            file_path: "data/raw/audio/1_pad.mp3".to_string(),
            duration_sec: 2.5,
            tempo_bpm: 100.0,
            estimated_key: "D".to_string(),
            spectral_centroid: 900.0,
            spectral_bandwidth: 300.0,
            spectral_rolloff: 1800.0,
            mfcc: [1.0; 13],
        };
        let table = FeatureTable::from_records(std::slice::from_ref(&record)).unwrap();
        assert_eq!(table.dim(), record.numeric_vector().len());
        assert_eq!(table.vector(0).unwrap(), record.numeric_vector().as_slice());
        assert_eq!(table.position("1_pad.mp3"), Some(0));
        assert_eq!(table.position("missing"), None);
    }
}
