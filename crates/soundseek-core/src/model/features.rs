use serde::{Deserialize, Serialize};

/// Number of MFCC coefficients kept per file.
pub const MFCC_COUNT: usize = 13;

/// Audio features extracted from one file.
///
/// Every scalar is a mean over analysis frames, except `duration_sec`
/// and `tempo_bpm` which describe the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub file_name: String,
    pub file_path: String,
    pub duration_sec: f64,
    pub tempo_bpm: f64,
    /// Dominant pitch class (`C`, `C#`, ... `B`).
    pub estimated_key: String,
    pub spectral_centroid: f64,
    pub spectral_bandwidth: f64,
    pub spectral_rolloff: f64,
    pub mfcc: [f64; MFCC_COUNT],
}

impl FeatureRecord {
    /// Column order of the features table.
    pub const COLUMNS: [&'static str; 8 + MFCC_COUNT] = [
        "file_name",
        "file_path",
        "duration_sec",
        "tempo_bpm",
        "estimated_key",
        "spectral_centroid",
        "spectral_bandwidth",
        "spectral_rolloff",
        "mfcc_1",
        "mfcc_2",
        "mfcc_3",
        "mfcc_4",
        "mfcc_5",
        "mfcc_6",
        "mfcc_7",
        "mfcc_8",
        "mfcc_9",
        "mfcc_10",
        "mfcc_11",
        "mfcc_12",
        "mfcc_13",
    ];

    /// Columns that identify a row rather than describe its sound.
    pub const NON_NUMERIC_COLUMNS: [&'static str; 3] = ["file_name", "file_path", "estimated_key"];

    /// Render the record as strings in [`Self::COLUMNS`] order.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(Self::COLUMNS.len());
        row.push(self.file_name.clone());
        row.push(self.file_path.clone());
        row.push(self.duration_sec.to_string());
        row.push(self.tempo_bpm.to_string());
        row.push(self.estimated_key.clone());
        row.push(self.spectral_centroid.to_string());
        row.push(self.spectral_bandwidth.to_string());
        row.push(self.spectral_rolloff.to_string());
        row.extend(self.mfcc.iter().map(ToString::to_string));
        row
    }

    /// The numeric columns in table order, as an index vector.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn numeric_vector(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(5 + MFCC_COUNT);
        v.push(self.duration_sec as f32);
        v.push(self.tempo_bpm as f32);
        v.push(self.spectral_centroid as f32);
        v.push(self.spectral_bandwidth as f32);
        v.push(self.spectral_rolloff as f32);
        v.extend(self.mfcc.iter().map(|&c| c as f32));
        v
    }
}
