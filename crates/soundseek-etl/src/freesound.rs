//! Freesound API v2 client.
//!
//! Searches the text-search endpoint, follows pagination, and downloads
//! high-quality previews. Every request is authenticated with the
//! `token` query parameter and paced by a shared [`RateLimiter`].
//! Transient failures (5xx, 429, timeouts) are retried with exponential
//! backoff.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::Retryable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use soundseek_core::model::{sample_file_name, Sample};

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::resilience::{RateLimiter, RetryPolicy};

pub const FREESOUND_API_BASE: &str = "https://freesound.org/apiv2";
pub const SEARCH_ENDPOINT: &str = "/search/text/";

/// Fields requested for every search result.
pub const SEARCH_FIELDS: &str =
    "id,name,previews,download,username,tags,duration,type,samplerate,bitrate,bpm,key,license";

pub const DEFAULT_PAGE_SIZE: u32 = 20;

const PREVIEW_KEYS: [&str; 2] = ["preview-hq-mp3", "preview-hq-ogg"];

/// One search result, as returned by Freesound.
///
/// Fields that were not requested explicitly are kept in `extra` so the
/// metadata log preserves the full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreesoundSample {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub previews: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samplerate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FreesoundSample {
    /// The preview to download: HQ mp3, else HQ ogg.
    #[must_use]
    pub fn preview_url(&self) -> Option<&str> {
        PREVIEW_KEYS
            .iter()
            .find_map(|k| self.previews.get(*k))
            .map(String::as_str)
    }

    /// File name the preview is stored under.
    #[must_use]
    pub fn file_name(&self) -> String {
        sample_file_name(self.id, &self.name)
    }

    /// Convert to a catalog record.
    #[must_use]
    pub fn to_catalog_sample(&self, query: &str, file_path: Option<PathBuf>) -> Sample {
        let mut sample = Sample::new(self.id, self.name.clone());
        sample.username = self.username.clone();
        sample.tags = self.tags.clone();
        sample.duration_secs = self.duration;
        sample.file_type = self.file_type.clone();
        sample.sample_rate = self.samplerate;
        sample.bitrate = self.bitrate;
        sample.bpm = self.bpm;
        sample.musical_key = self.key.clone();
        sample.license = self.license.clone();
        sample.preview_url = self.preview_url().map(ToString::to_string);
        sample.file_path = file_path;
        sample.query = Some(query.to_string());
        sample
    }
}

/// One page of text-search results.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<FreesoundSample>,
}

/// Query parameters for the first search request.
///
/// Later pages are requested through the `next` URL, which already
/// carries them.
pub fn search_params(
    query: &str,
    filter_tag: Option<&str>,
    page_size: u32,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("query", query.to_string()),
        ("fields", SEARCH_FIELDS.to_string()),
        ("page_size", page_size.to_string()),
    ];
    if let Some(tag) = filter_tag {
        params.push(("filter", format!("tag:{tag}")));
    }
    params
}

/// Freesound API client.
#[derive(Debug, Clone)]
pub struct FreesoundClient {
    http: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl FreesoundClient {
    /// Create a client with the default page size and a 1 req/sec limit.
    ///
    /// # Errors
    /// Returns [`FetchError::MissingApiKey`] for an empty key, or an error
    /// if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> FetchResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("soundseek/0.1.0 (https://github.com/soundseek/soundseek)")
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: FREESOUND_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            rate_limiter: RateLimiter::new(1),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from configuration, resolving the API key from the
    /// config, then `FREESOUND_API_KEY`.
    pub fn from_config(config: &Config) -> FetchResult<Self> {
        let key = config.resolve_api_key().ok_or(FetchError::MissingApiKey)?;
        Ok(Self::new(key)?
            .with_page_size(config.page_size)
            .with_rate_limiter(RateLimiter::new(config.requests_per_second)))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 150);
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Search Freesound for audio samples by text query.
    ///
    /// Follows `next` links until `max_results` results are collected or
    /// the pages run out. A failure on the first page is returned; a
    /// failure on a later page is logged and ends pagination with the
    /// results gathered so far.
    pub async fn search_samples(
        &self,
        query: &str,
        max_results: usize,
        filter_tag: Option<&str>,
    ) -> FetchResult<Vec<FreesoundSample>> {
        log::info!(
            "Searching Freesound for query='{}' with max_results={}",
            query,
            max_results
        );

        let mut results: Vec<FreesoundSample> = Vec::new();
        let mut params = search_params(query, filter_tag, self.page_size);
        let mut next_url = Some(format!("{}{}", self.base_url, SEARCH_ENDPOINT));
        let mut first_page = true;

        while let Some(url) = next_url.take() {
            if results.len() >= max_results {
                break;
            }

            let page = match self.get_page(&url, &params).await {
                Ok(page) => page,
                Err(e) if first_page => return Err(e),
                Err(e) => {
                    log::warn!("Failed to fetch results: {}", e);
                    break;
                }
            };

            if let Some(count) = page.count.filter(|_| first_page) {
                log::debug!("Freesound reports {} matches", count);
            }

            results.extend(page.results);
            next_url = page.next;
            params.clear();
            first_page = false;
        }

        log::info!("Found {} results.", results.len());
        results.truncate(max_results);
        Ok(results)
    }

    async fn get_page(&self, url: &str, params: &[(&str, String)]) -> FetchResult<SearchPage> {
        let fetch = || async {
            self.rate_limiter.acquire().await;

            let response = self
                .http
                .get(url)
                .query(&[("token", self.api_key.as_str())])
                .query(params)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::from_status(status, body));
            }

            response
                .json::<SearchPage>()
                .await
                .map_err(|e| FetchError::Parse {
                    message: e.to_string(),
                })
        };

        fetch
            .retry(self.retry.backoff())
            .when(FetchError::is_transient)
            .notify(|err: &FetchError, delay: Duration| {
                log::warn!("Freesound request failed ({}), retrying in {:?}", err, delay);
            })
            .await
    }

    /// Download a sample's preview into `audio_dir`.
    ///
    /// Returns `Ok(None)` when the sample has no preview. An existing file
    /// is reused unless `overwrite` is set. A failed transfer removes the
    /// partial file.
    pub async fn download_sample(
        &self,
        sample: &FreesoundSample,
        audio_dir: &Path,
        overwrite: bool,
    ) -> FetchResult<Option<PathBuf>> {
        let Some(preview_url) = sample.preview_url() else {
            log::warn!("No preview URL found for sample: {}", sample.name);
            return Ok(None);
        };

        let file_name = sample.file_name();
        let path = audio_dir.join(&file_name);

        if path.exists() && !overwrite {
            log::info!("File already exists, skipping: {}", file_name);
            return Ok(Some(path));
        }

        tokio::fs::create_dir_all(audio_dir).await?;
        log::info!("Downloading sample: {} -> {}", sample.name, file_name);

        match self.stream_to_file(preview_url, &path).await {
            Ok(bytes) => {
                log::debug!("Wrote {} bytes to {}", bytes, path.display());
                Ok(Some(path))
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    log::debug!(
                        "No partial file to remove at {}: {}",
                        path.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> FetchResult<u64> {
        let mut response = self
            .http
            .get(url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, url));
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
