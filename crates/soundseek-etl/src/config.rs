use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable the Freesound key is read from when no
/// configured key is present.
pub const FREESOUND_API_KEY_ENV: &str = "FREESOUND_API_KEY";

/// Configuration for soundseek.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SOUNDSEEK_* prefix)
/// 3. Config file (~/.config/soundseek/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Freesound API key (required for fetching).
    ///
    /// Can be set via:
    /// - ENV: SOUNDSEEK_FREESOUND_API_KEY or FREESOUND_API_KEY
    /// - Config: freesound_api_key = "..."
    #[serde(default)]
    pub freesound_api_key: Option<String>,

    /// Path to the SQLite catalog. Defaults to `<data_dir>/soundseek.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Root of all generated data (audio, metadata, features, index).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sample rate audio is resampled to before analysis.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Results requested per Freesound search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Freesound request budget.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            freesound_api_key: None,
            database_path: None,
            data_dir: default_data_dir(),
            sample_rate: default_sample_rate(),
            page_size: default_page_size(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/soundseek/config.toml
    /// Reads environment variables with SOUNDSEEK_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("soundseek");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration and apply CLI overrides.
    pub fn load_with_overrides(
        database_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::load()?.with_overrides(database_path, data_dir))
    }

    #[must_use]
    pub fn with_overrides(mut self, database_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        if let Some(path) = database_path {
            self.database_path = Some(path);
        }
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    /// The effective catalog path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("soundseek.db"))
    }

    /// The configured Freesound key, falling back to `FREESOUND_API_KEY`.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.freesound_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(FREESOUND_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    #[must_use]
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }
}

/// Where each generated artefact lives under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub data_dir: PathBuf,
    /// Downloaded previews.
    pub audio_dir: PathBuf,
    /// Append-only JSONL log of Freesound search results.
    pub metadata_path: PathBuf,
    /// Extracted feature table.
    pub features_path: PathBuf,
    /// Persisted search index.
    pub index_path: PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            audio_dir: data_dir.join("raw").join("audio"),
            metadata_path: data_dir
                .join("raw")
                .join("metadata")
                .join("freesound_metadata.jsonl"),
            features_path: data_dir.join("processed").join("features.csv"),
            index_path: data_dir.join("processed").join("index.json"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_sample_rate() -> u32 {
    crate::extract::DEFAULT_SAMPLE_RATE
}

const fn default_page_size() -> u32 {
    20
}

const fn default_requests_per_second() -> u32 {
    1
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/soundseek/config.toml
/// - macOS: ~/Library/Application Support/soundseek/config.toml
/// - Windows: %APPDATA%\soundseek\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("soundseek")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# SoundSeek Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SOUNDSEEK_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Freesound API key, required by `soundseek fetch` and `soundseek process`
#
# Apply for a key at: https://freesound.org/apiv2/apply
#
# Can also be set via:
# - Environment: SOUNDSEEK_FREESOUND_API_KEY=your-key-here
# - Environment or .env file: FREESOUND_API_KEY=your-key-here
#freesound_api_key = "your-freesound-api-key-here"

# Root directory for downloaded audio, metadata, features and the index
#
# Can also be set via:
# - CLI: soundseek --data-dir /custom/data fetch piano
# - Environment: SOUNDSEEK_DATA_DIR=/custom/data
data_dir = "data"

# Path to the SQLite catalog
#
# Default: <data_dir>/soundseek.db
#database_path = "/path/to/custom/soundseek.db"

# Sample rate (Hz) audio is resampled to before feature extraction
sample_rate = 22050

# Results per Freesound search page, and the request rate limit
page_size = 20
requests_per_second = 1
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
