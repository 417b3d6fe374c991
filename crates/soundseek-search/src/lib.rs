//! Similarity search for soundseek.
//!
//! Loads the extracted features table, indexes the numeric feature
//! vectors with an exact L2 index, answers nearest-neighbour queries and
//! scores retrieval and tag classification against Freesound tags.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod table;

pub use engine::{Normalization, SearchEngine, SearchHit};
pub use error::{Result, SearchError};
pub use eval::{
    evaluate_classifier, evaluate_retrieval, macro_f1, mean_reciprocal_rank, precision_at_k,
    reciprocal_rank, ClassifierReport, KnnTagClassifier, RetrievalReport,
};
pub use index::{FlatL2Index, Neighbor};
pub use table::{FeatureTable, DEFAULT_EXCLUDED_COLUMNS};
