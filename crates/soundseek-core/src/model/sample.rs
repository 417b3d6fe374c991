use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::model::ids::SampleId;

/// Build the on-disk file name for a downloaded preview.
///
/// Spaces become underscores, and so do path separators, so a sample
/// name can never point outside the audio directory.
#[must_use]
pub fn sample_file_name(freesound_id: u64, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    format!("{freesound_id}_{safe}.mp3")
}

/// A Freesound sample recorded in the local catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,

    /// Freesound's numeric sound ID.
    pub freesound_id: u64,

    pub name: String,
    pub username: Option<String>,

    /// Uploader tags, as returned by Freesound.
    pub tags: Vec<String>,

    pub duration_secs: Option<f64>,

    /// Original upload type (`wav`, `mp3`, `aiff`, ...).
    pub file_type: Option<String>,

    pub sample_rate: Option<f64>,
    pub bitrate: Option<f64>,
    pub bpm: Option<f64>,
    pub musical_key: Option<String>,
    pub license: Option<String>,

    /// URL of the preview that was (or would be) downloaded.
    pub preview_url: Option<String>,

    /// Local path of the downloaded preview, once downloaded.
    pub file_path: Option<PathBuf>,

    /// The search text this sample was found with.
    pub query: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl Sample {
    #[must_use]
    pub fn new(freesound_id: u64, name: impl Into<String>) -> Self {
        Self {
            id: SampleId::new(),
            freesound_id,
            name: name.into(),
            username: None,
            tags: Vec::new(),
            duration_secs: None,
            file_type: None,
            sample_rate: None,
            bitrate: None,
            bpm: None,
            musical_key: None,
            license: None,
            preview_url: None,
            file_path: None,
            query: None,
            fetched_at: Utc::now(),
        }
    }

    /// File name of the local preview: the downloaded file's name, or the
    /// name a download would use.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| sample_file_name(self.freesound_id, &self.name))
    }

    #[must_use]
    pub const fn is_downloaded(&self) -> bool {
        self.file_path.is_some()
    }

    /// Tags lower-cased and de-duplicated, used as evaluation labels.
    #[must_use]
    pub fn label_set(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
