use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{FeatureRecord, Sample, SampleId, MFCC_COUNT};

use super::migrations::MIGRATIONS;

const SAMPLE_COLUMNS: &str = "id, freesound_id, name, username, tags, duration_secs, file_type,
    sample_rate, bitrate, bpm, musical_key, license, preview_url, file_path, query, fetched_at";

const FEATURE_COLUMNS: &str = "file_name, file_path, duration_sec, tempo_bpm, estimated_key,
    spectral_centroid, spectral_bandwidth, spectral_rolloff, mfcc";

/// The soundseek catalog: fetched samples and their extracted features.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(Into::into)
        .map_err(|e| conversion_error(idx, e))
}

fn freesound_id_param(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| {
        crate::Error::InvalidData(format!("freesound id {id} does not fit in a signed integer"))
    })
}

// Sample CRUD
impl Database {
    /// Insert a sample, or refresh the row with the same Freesound ID.
    ///
    /// A refresh keeps the original catalog ID and never clears a known
    /// local file path.
    pub fn upsert_sample(&self, sample: &Sample) -> Result<()> {
        self.conn.execute(
            "INSERT INTO samples (
                id, freesound_id, name, username, tags, duration_secs, file_type,
                sample_rate, bitrate, bpm, musical_key, license, preview_url,
                file_path, query, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(freesound_id) DO UPDATE SET
                name = excluded.name,
                username = excluded.username,
                tags = excluded.tags,
                duration_secs = excluded.duration_secs,
                file_type = excluded.file_type,
                sample_rate = excluded.sample_rate,
                bitrate = excluded.bitrate,
                bpm = excluded.bpm,
                musical_key = excluded.musical_key,
                license = excluded.license,
                preview_url = excluded.preview_url,
                file_path = COALESCE(excluded.file_path, samples.file_path),
                query = excluded.query,
                fetched_at = excluded.fetched_at",
            rusqlite::params![
                sample.id.to_string(),
                freesound_id_param(sample.freesound_id)?,
                sample.name,
                sample.username,
                serde_json::to_string(&sample.tags)?,
                sample.duration_secs,
                sample.file_type,
                sample.sample_rate,
                sample.bitrate,
                sample.bpm,
                sample.musical_key,
                sample.license,
                sample.preview_url,
                sample
                    .file_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                sample.query,
                sample.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up a sample by its Freesound ID.
    pub fn get_sample_by_freesound_id(&self, freesound_id: u64) -> Result<Option<Sample>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples WHERE freesound_id = ?1"
        ))?;
        let mut rows = stmt.query_map([freesound_id_param(freesound_id)?], row_to_sample)?;
        Ok(rows.next().transpose()?)
    }

    /// List all samples ordered by Freesound ID.
    pub fn list_samples(&self) -> Result<Vec<Sample>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples ORDER BY freesound_id"
        ))?;
        let samples = stmt
            .query_map([], row_to_sample)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(samples)
    }

    pub fn count_samples(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM samples")
    }

    pub fn count_downloaded_samples(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM samples WHERE file_path IS NOT NULL")
    }

    /// Downloaded samples that have no feature row yet.
    pub fn list_samples_missing_features(&self) -> Result<Vec<Sample>> {
        let mut stmt = self.conn.prepare("SELECT file_name FROM features")?;
        let analysed = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;

        Ok(self
            .list_samples()?
            .into_iter()
            .filter(|s| s.is_downloaded() && !analysed.contains(&s.file_name()))
            .collect())
    }

    /// Map each downloaded sample's file name to its normalised tag set.
    ///
    /// Samples without tags are left out.
    pub fn tag_labels(&self) -> Result<HashMap<String, BTreeSet<String>>> {
        Ok(self
            .list_samples()?
            .into_iter()
            .filter(Sample::is_downloaded)
            .filter_map(|s| {
                let labels = s.label_set();
                (!labels.is_empty()).then(|| (s.file_name(), labels))
            })
            .collect())
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

fn row_to_sample(row: &rusqlite::Row) -> rusqlite::Result<Sample> {
    let id_str: String = row.get(0)?;
    let id: SampleId = id_str.parse().map_err(|e| conversion_error(0, e))?;
    let freesound_id: i64 = row.get(1)?;
    let tags_json: String = row.get(4)?;
    let file_path: Option<String> = row.get(13)?;
    let fetched_at: String = row.get(15)?;

    Ok(Sample {
        id,
        freesound_id: u64::try_from(freesound_id).map_err(|e| conversion_error(1, e))?,
        name: row.get(2)?,
        username: row.get(3)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| conversion_error(4, e))?,
        duration_secs: row.get(5)?,
        file_type: row.get(6)?,
        sample_rate: row.get(7)?,
        bitrate: row.get(8)?,
        bpm: row.get(9)?,
        musical_key: row.get(10)?,
        license: row.get(11)?,
        preview_url: row.get(12)?,
        file_path: file_path.map(PathBuf::from),
        query: row.get(14)?,
        fetched_at: parse_timestamp(15, &fetched_at)?,
    })
}

// Feature CRUD
impl Database {
    /// Insert or replace the features for a file.
    pub fn upsert_features(&self, record: &FeatureRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO features (
                file_name, file_path, duration_sec, tempo_bpm, estimated_key,
                spectral_centroid, spectral_bandwidth, spectral_rolloff, mfcc, extracted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(file_name) DO UPDATE SET
                file_path = excluded.file_path,
                duration_sec = excluded.duration_sec,
                tempo_bpm = excluded.tempo_bpm,
                estimated_key = excluded.estimated_key,
                spectral_centroid = excluded.spectral_centroid,
                spectral_bandwidth = excluded.spectral_bandwidth,
                spectral_rolloff = excluded.spectral_rolloff,
                mfcc = excluded.mfcc,
                extracted_at = excluded.extracted_at",
            rusqlite::params![
                record.file_name,
                record.file_path,
                record.duration_sec,
                record.tempo_bpm,
                record.estimated_key,
                record.spectral_centroid,
                record.spectral_bandwidth,
                record.spectral_rolloff,
                serde_json::to_string(&record.mfcc.to_vec())?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List all feature rows ordered by file name.
    pub fn list_features(&self) -> Result<Vec<FeatureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features ORDER BY file_name"
        ))?;
        let records = stmt
            .query_map([], row_to_features)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count_features(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM features")
    }
}

fn row_to_features(row: &rusqlite::Row) -> rusqlite::Result<FeatureRecord> {
    let mfcc_json: String = row.get(8)?;
    let coefficients: Vec<f64> =
        serde_json::from_str(&mfcc_json).map_err(|e| conversion_error(8, e))?;
    let mfcc: [f64; MFCC_COUNT] = coefficients.try_into().map_err(|v: Vec<f64>| {
        conversion_error(
            8,
            crate::Error::InvalidData(format!(
                "expected {MFCC_COUNT} MFCC coefficients, found {}",
                v.len()
            )),
        )
    })?;

    Ok(FeatureRecord {
        file_name: row.get(0)?,
        file_path: row.get(1)?,
        duration_sec: row.get(2)?,
        tempo_bpm: row.get(3)?,
        estimated_key: row.get(4)?,
        spectral_centroid: row.get(5)?,
        spectral_bandwidth: row.get(6)?,
        spectral_rolloff: row.get(7)?,
        mfcc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(file_name: &str, centroid: f64) -> FeatureRecord {
        FeatureRecord {
            file_name: file_name.to_string(),
            file_path: format!("data/raw/audio/{file_name}"),
            duration_sec: 2.0,
            tempo_bpm: 120.0,
            estimated_key: "A".to_string(),
            spectral_centroid: centroid,
            spectral_bandwidth: 300.0,
            spectral_rolloff: 1800.0,
            mfcc: [1.5; MFCC_COUNT],
        }
    }

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_reopen_does_not_reapply_migrations() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_sample_round_trip() {
        let db = Database::open_in_memory().unwrap();

        let mut sample = Sample::new(110_384, "Jazz loop");
        sample.tags = vec!["jazz".into(), "loop".into()];
        sample.username = Some("someone".into());
        sample.bpm = Some(92.0);
        db.upsert_sample(&sample).unwrap();

        let loaded = db.get_sample_by_freesound_id(110_384).unwrap().unwrap();
        assert_eq!(loaded.id, sample.id);
        assert_eq!(loaded.tags, sample.tags);
        assert_eq!(loaded.bpm, Some(92.0));
        assert!(db.get_sample_by_freesound_id(1).unwrap().is_none());
    }

    #[test]
    fn test_upsert_keeps_id_and_file_path() {
        let db = Database::open_in_memory().unwrap();

        let mut first = Sample::new(5, "pad");
        first.file_path = Some(PathBuf::from("data/raw/audio/5_pad.mp3"));
        db.upsert_sample(&first).unwrap();

        let mut second = Sample::new(5, "pad renamed");
        second.file_path = None;
        db.upsert_sample(&second).unwrap();

        let samples = db.list_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].id, first.id);
        assert_eq!(samples[0].name, "pad renamed");
        assert_eq!(samples[0].file_path, first.file_path);
    }

    #[test]
    fn test_counts() {
        let db = Database::open_in_memory().unwrap();
        let mut downloaded = Sample::new(1, "a");
        downloaded.file_path = Some(PathBuf::from("1_a.mp3"));
        db.upsert_sample(&downloaded).unwrap();
        db.upsert_sample(&Sample::new(2, "b")).unwrap();
        db.upsert_features(&features("1_a.mp3", 10.0)).unwrap();

        assert_eq!(db.count_samples().unwrap(), 2);
        assert_eq!(db.count_downloaded_samples().unwrap(), 1);
        assert_eq!(db.count_features().unwrap(), 1);
    }

    #[test]
    fn test_features_upsert_replaces() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_features(&features("1_a.mp3", 10.0)).unwrap();
        db.upsert_features(&features("1_a.mp3", 20.0)).unwrap();
        db.upsert_features(&features("0_b.mp3", 5.0)).unwrap();

        let records = db.list_features().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name, "0_b.mp3");
        assert_eq!(records[1].spectral_centroid, 20.0);
        assert_eq!(records[1].mfcc, [1.5; MFCC_COUNT]);
    }

    #[test]
    fn test_samples_missing_features() {
        let db = Database::open_in_memory().unwrap();
        for (id, name) in [(1, "a"), (2, "b")] {
            let mut s = Sample::new(id, name);
            s.file_path = Some(PathBuf::from(s.file_name()));
            db.upsert_sample(&s).unwrap();
        }
        db.upsert_sample(&Sample::new(3, "not downloaded")).unwrap();
        db.upsert_features(&features("1_a.mp3", 1.0)).unwrap();

        let missing = db.list_samples_missing_features().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].freesound_id, 2);
    }

    #[test]
    fn test_tag_labels_skip_untagged_and_missing_files() {
        let db = Database::open_in_memory().unwrap();

        let mut tagged = Sample::new(1, "piano note");
        tagged.tags = vec!["Piano".into(), "note".into()];
        tagged.file_path = Some(PathBuf::from("1_piano_note.mp3"));
        db.upsert_sample(&tagged).unwrap();

        let mut untagged = Sample::new(2, "x");
        untagged.file_path = Some(PathBuf::from("2_x.mp3"));
        db.upsert_sample(&untagged).unwrap();

        let mut remote = Sample::new(3, "y");
        remote.tags = vec!["drum".into()];
        db.upsert_sample(&remote).unwrap();

        let labels = db.tag_labels().unwrap();
        assert_eq!(labels.len(), 1);
        let piano = &labels["1_piano_note.mp3"];
        assert!(piano.contains("piano"));
        assert!(piano.contains("note"));
    }
}
