/// A single forward-only schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Samples found on Freesound
CREATE TABLE IF NOT EXISTS samples (
    id TEXT PRIMARY KEY,
    freesound_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    username TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    duration_secs REAL,
    file_type TEXT,
    sample_rate REAL,
    bitrate REAL,
    bpm REAL,
    musical_key TEXT,
    license TEXT,
    preview_url TEXT,
    file_path TEXT,
    query TEXT,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_samples_file_path ON samples(file_path);
"#;

const MIGRATION_002: &str = r#"
-- Per-file audio features
CREATE TABLE IF NOT EXISTS features (
    file_name TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    duration_sec REAL NOT NULL,
    tempo_bpm REAL NOT NULL,
    estimated_key TEXT NOT NULL,
    spectral_centroid REAL NOT NULL,
    spectral_bandwidth REAL NOT NULL,
    spectral_rolloff REAL NOT NULL,
    mfcc TEXT NOT NULL,
    extracted_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "samples",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        name: "features",
        sql: MIGRATION_002,
    },
];
