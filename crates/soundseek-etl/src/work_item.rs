use serde::{Deserialize, Serialize};
use std::fmt;
use treadle::WorkItem;

/// A batch of samples moving through the pipeline.
///
/// This is the treadle `WorkItem` that flows through the fetch → extract
/// → index stages. A local-only run has no query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleBatch {
    id: String,
    /// The Freesound search text for this batch, if it fetches.
    pub query: Option<String>,
}

impl SampleBatch {
    #[must_use]
    pub fn new(id: impl Into<String>, query: Option<String>) -> Self {
        Self {
            id: id.into(),
            query,
        }
    }

    /// A batch keyed by its query, so re-running the same query resumes
    /// the same pipeline state.
    #[must_use]
    pub fn for_query(query: &str) -> Self {
        let slug: String = query
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        Self::new(format!("fetch-{slug}"), Some(query.to_string()))
    }

    /// A batch with a fresh id, so every stage runs again.
    #[must_use]
    pub fn fresh(query: Option<&str>) -> Self {
        let prefix = if query.is_some() { "fetch" } else { "local" };
        Self::new(
            format!("{prefix}-{}", uuid::Uuid::new_v4()),
            query.map(str::to_string),
        )
    }
}

impl WorkItem for SampleBatch {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SampleBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{} ({})", self.id, query),
            None => write!(f, "{}", self.id),
        }
    }
}
