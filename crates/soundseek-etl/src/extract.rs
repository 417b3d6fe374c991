//! Per-file audio feature extraction and the features table.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use soundseek_core::model::{AudioFormat, FeatureRecord, MFCC_COUNT};
use soundseek_core::schema::Database;
use treadle::{Stage, StageContext, StageOutcome};
use walkdir::WalkDir;

use crate::audio::{
    decode_audio, estimate_key, estimate_tempo, mel_spectrogram_db, mfcc_means, spectral_bandwidth,
    spectral_centroid, spectral_rolloff, MelFilterbank, Spectrogram, ROLLOFF_PERCENT,
};
use crate::config::Config;

/// Default analysis sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Extracts a [`FeatureRecord`] from every audio file in one directory.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    audio_dir: PathBuf,
    sample_rate: u32,
}

/// Outcome of `FeatureExtractor::process_directory`.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub records: Vec<FeatureRecord>,
    /// Files that could not be analysed.
    pub failed: Vec<PathBuf>,
}

impl FeatureExtractor {
    /// # Errors
    ///
    /// Fails when `audio_dir` does not exist.
    pub fn new(audio_dir: impl Into<PathBuf>, sample_rate: u32) -> Result<Self> {
        let audio_dir = audio_dir.into();
        if !audio_dir.is_dir() {
            bail!("Audio directory not found: {}", audio_dir.display());
        }
        Ok(Self {
            audio_dir,
            sample_rate,
        })
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Compute every feature of one file.
    pub fn extract_from_file(&self, path: &Path) -> Result<FeatureRecord> {
        let audio = decode_audio(path, self.sample_rate)?;
        if audio.samples.is_empty() {
            bail!("No audio samples decoded from {}", path.display());
        }

        let spec = Spectrogram::compute(&audio.samples, audio.sample_rate);
        let filterbank = MelFilterbank::for_spectrogram(&spec);
        let mel_db = mel_spectrogram_db(&spec, &filterbank);
        let mfcc: [f64; MFCC_COUNT] = mfcc_means(&mel_db);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Path has no file name: {}", path.display()))?;

        Ok(FeatureRecord {
            file_name,
            file_path: path.to_string_lossy().into_owned(),
            duration_sec: audio.duration_secs,
            tempo_bpm: estimate_tempo(&mel_db, spec.frame_rate()),
            estimated_key: estimate_key(&spec).to_string(),
            spectral_centroid: spectral_centroid(&spec),
            spectral_bandwidth: spectral_bandwidth(&spec),
            spectral_rolloff: spectral_rolloff(&spec, ROLLOFF_PERCENT),
            mfcc,
        })
    }

    /// MP3 files first, then WAV files, each sorted by name.
    pub fn audio_files(&self, limit: Option<usize>) -> Vec<PathBuf> {
        let mut mp3 = Vec::new();
        let mut wav = Vec::new();
        for entry in WalkDir::new(&self.audio_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            match AudioFormat::from_path(path) {
                AudioFormat::Mp3 => mp3.push(path.to_path_buf()),
                AudioFormat::Wav => wav.push(path.to_path_buf()),
                _ => {}
            }
        }
        mp3.append(&mut wav);
        if let Some(limit) = limit {
            mp3.truncate(limit);
        }
        mp3
    }

    /// Extract features from every audio file; failures are logged and skipped.
    pub fn process_directory(&self, limit: Option<usize>) -> ExtractReport {
        let files = self.audio_files(limit);
        log::info!(
            "Extracting features from {} files in {}",
            files.len(),
            self.audio_dir.display()
        );

        let mut report = ExtractReport::default();
        for path in files {
            log::debug!("Analysing: {}", path.display());
            match self.extract_from_file(&path) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    log::error!("Failed to process {}: {:#}", path.display(), e);
                    report.failed.push(path);
                }
            }
        }
        report
    }
}

/// Write the features table as CSV. Returns whether anything was written.
pub fn write_features_csv(path: &Path, records: &[FeatureRecord]) -> Result<bool> {
    if records.is_empty() {
        log::warn!("No features extracted; {} not written", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(FeatureRecord::COLUMNS)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;

    log::info!("Saved {} feature rows to {}", records.len(), path.display());
    Ok(true)
}

/// The Extract stage: analyse downloaded audio, write the features table
/// and record the features in the catalog.
#[derive(Debug)]
pub struct ExtractStage {
    audio_dir: PathBuf,
    features_path: PathBuf,
    db_path: PathBuf,
    sample_rate: u32,
    limit: Option<usize>,
}

impl ExtractStage {
    #[must_use]
    pub fn new(audio_dir: PathBuf, features_path: PathBuf, db_path: PathBuf, sample_rate: u32) -> Self {
        Self {
            audio_dir,
            features_path,
            db_path,
            sample_rate,
            limit: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let layout = config.layout();
        Self::new(
            layout.audio_dir,
            layout.features_path,
            config.database_path(),
            config.sample_rate,
        )
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Run extraction synchronously.
    pub fn run(&self) -> Result<ExtractReport> {
        let extractor = FeatureExtractor::new(&self.audio_dir, self.sample_rate)?;
        let report = extractor.process_directory(self.limit);

        write_features_csv(&self.features_path, &report.records)?;

        let db = Database::open(&self.db_path)?;
        for record in &report.records {
            db.upsert_features(record)?;
        }

        Ok(report)
    }
}

#[async_trait::async_trait]
impl Stage for ExtractStage {
    fn name(&self) -> &str {
        "extract"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Starting feature extraction in {}", self.audio_dir.display());

        match self.run() {
            Ok(report) => {
                log::info!(
                    "Extract complete: {} files analysed, {} failed",
                    report.records.len(),
                    report.failed.len()
                );
                Ok(StageOutcome::Complete)
            }
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Extract failed: {e:#}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn write_sine_wav(path: &Path, freq: f32, secs: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(secs * 22050.0) as usize {
            let v = (2.0 * PI * freq * i as f32 / 22050.0).sin() * 0.5;
            writer.write_sample((v * f32::from(i16::MAX)) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_new_requires_existing_directory() {
        assert!(FeatureExtractor::new("/nonexistent/audio", 22050).is_err());
    }

    #[test]
    fn test_audio_files_order_and_limit() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.wav", "a.wav", "z.mp3", "c.mp3", "notes.txt"] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();
        std::fs::write(temp_dir.path().join("nested/d.mp3"), b"").unwrap();

        let extractor = FeatureExtractor::new(temp_dir.path(), 22050).unwrap();
        let names: Vec<String> = extractor
            .audio_files(None)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.mp3", "z.mp3", "a.wav", "b.wav"]);

        assert_eq!(extractor.audio_files(Some(3)).len(), 3);
    }

    #[test]
    fn test_extract_from_sine() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a440.wav");
        write_sine_wav(&path, 440.0, 2.0);

        let extractor = FeatureExtractor::new(temp_dir.path(), 22050).unwrap();
        let record = extractor.extract_from_file(&path).unwrap();

        assert_eq!(record.file_name, "a440.wav");
        assert!((record.duration_sec - 2.0).abs() < 0.01);
        assert_eq!(record.estimated_key, "A");
        assert!((record.spectral_centroid - 440.0).abs() < 50.0);
        assert!(record.spectral_rolloff > 0.0);
        assert!(record.mfcc.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_process_directory_skips_bad_files() {
        let temp_dir = TempDir::new().unwrap();
        write_sine_wav(&temp_dir.path().join("good.wav"), 220.0, 1.0);
        std::fs::write(temp_dir.path().join("broken.mp3"), b"not audio").unwrap();

        let extractor = FeatureExtractor::new(temp_dir.path(), 22050).unwrap();
        let report = extractor.process_directory(None);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].file_name, "good.wav");
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let temp_dir = TempDir::new().unwrap();
        write_sine_wav(&temp_dir.path().join("tone.wav"), 330.0, 1.0);
        let extractor = FeatureExtractor::new(temp_dir.path(), 22050).unwrap();
        let report = extractor.process_directory(None);

        let csv_path = temp_dir.path().join("processed/features.csv");
        assert!(write_features_csv(&csv_path, &report.records).unwrap());

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), FeatureRecord::COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with("tone.wav,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_csv_with_no_records_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("features.csv");
        assert!(!write_features_csv(&csv_path, &[]).unwrap());
        assert!(!csv_path.exists());
    }

    #[test]
    fn test_extract_stage_records_features() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let layout = config.layout();
        std::fs::create_dir_all(&layout.audio_dir).unwrap();
        write_sine_wav(&layout.audio_dir.join("1_tone.wav"), 440.0, 1.0);

        let stage = ExtractStage::from_config(&config);
        assert_eq!(stage.name(), "extract");
        let report = stage.run().unwrap();

        assert_eq!(report.records.len(), 1);
        assert!(layout.features_path.exists());
        let db = Database::open(config.database_path()).unwrap();
        assert_eq!(db.count_features().unwrap(), 1);
    }
}
