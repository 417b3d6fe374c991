//! Data pipeline for soundseek.
//!
//! Fetches samples and metadata from Freesound, decodes the downloaded
//! previews, extracts per-file audio features and builds the search
//! index. Each step is also available as a treadle `Stage`.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod audio;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod freesound;
pub mod index;
pub mod metadata;
pub mod pipeline;
pub mod resilience;
pub mod work_item;

pub use config::{Config, DataLayout};
pub use error::{FetchError, FetchResult};
pub use extract::{write_features_csv, ExtractReport, ExtractStage, FeatureExtractor};
pub use fetch::{fetch_and_store, FetchReport, FetchStage, FetchTargets};
pub use freesound::{FreesoundClient, FreesoundSample};
pub use index::IndexStage;
pub use metadata::MetadataLog;
pub use pipeline::{build_local_pipeline, build_pipeline};
pub use work_item::SampleBatch;
