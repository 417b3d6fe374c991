//! Retrieval and tag-classification metrics.
//!
//! Freesound tags act as ground truth: two samples are relevant to each
//! other when they share at least one tag.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::engine::SearchEngine;
use crate::error::Result;

#[allow(clippy::cast_precision_loss)]
const fn as_f64(n: usize) -> f64 {
    n as f64
}

/// `1 / rank` of the first relevant item (ranks start at 1), 0 when no
/// item is relevant.
pub fn reciprocal_rank<T: Eq + Hash>(ranked: &[T], relevant: &HashSet<T>) -> f64 {
    ranked
        .iter()
        .position(|item| relevant.contains(item))
        .map_or(0.0, |i| 1.0 / as_f64(i + 1))
}

/// Mean of per-query reciprocal ranks; 0 for no queries.
pub fn mean_reciprocal_rank(reciprocal_ranks: &[f64]) -> f64 {
    mean(reciprocal_ranks)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / as_f64(values.len())
}

/// Relevant items among the first `k`, divided by `k`.
pub fn precision_at_k<T: Eq + Hash>(ranked: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits = ranked
        .iter()
        .take(k)
        .filter(|item| relevant.contains(item))
        .count();
    as_f64(hits) / as_f64(k)
}

/// Multi-label macro-averaged F1 over every label present in `truth`.
///
/// `truth` and `predicted` are aligned per sample.
pub fn macro_f1(truth: &[BTreeSet<String>], predicted: &[BTreeSet<String>]) -> f64 {
    let labels: BTreeSet<&String> = truth.iter().flatten().collect();

    let mut scores = Vec::with_capacity(labels.len());
    for label in labels {
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (t, p) in truth.iter().zip(predicted) {
            match (t.contains(label), p.contains(label)) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        if tp + fp + fn_ == 0 {
            continue;
        }
        let precision = if tp + fp == 0 { 0.0 } else { as_f64(tp) / as_f64(tp + fp) };
        let recall = if tp + fn_ == 0 { 0.0 } else { as_f64(tp) / as_f64(tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        scores.push(f1);
    }

    mean(&scores)
}

/// Retrieval quality over every labelled sample in the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalReport {
    pub queries: usize,
    pub k: usize,
    pub mrr: f64,
    pub precision_at_k: f64,
}

/// Use each labelled, indexed sample as a query and score its `k`
/// nearest neighbours.
pub fn evaluate_retrieval(
    engine: &SearchEngine,
    labels: &HashMap<String, BTreeSet<String>>,
    k: usize,
) -> Result<RetrievalReport> {
    let queries: BTreeSet<&str> = engine
        .table()
        .file_names()
        .filter(|name| labels.contains_key(*name))
        .collect();

    let mut reciprocal_ranks = Vec::with_capacity(queries.len());
    let mut precisions = Vec::with_capacity(queries.len());
    for query in &queries {
        let Some(query_tags) = labels.get(*query) else {
            continue;
        };
        let ranked: Vec<String> = engine
            .query_by_sample(query, k)?
            .into_iter()
            .map(|hit| hit.file_name)
            .collect();
        let relevant: HashSet<String> = ranked
            .iter()
            .filter(|name| {
                labels
                    .get(name.as_str())
                    .is_some_and(|tags| !tags.is_disjoint(query_tags))
            })
            .cloned()
            .collect();

        reciprocal_ranks.push(reciprocal_rank(&ranked, &relevant));
        precisions.push(precision_at_k(&ranked, &relevant, k));
    }

    let report = RetrievalReport {
        queries: queries.len(),
        k,
        mrr: mean_reciprocal_rank(&reciprocal_ranks),
        precision_at_k: mean(&precisions),
    };
    log::info!(
        "Retrieval over {} queries: MRR {:.4}, P@{} {:.4}",
        report.queries,
        report.mrr,
        k,
        report.precision_at_k
    );
    Ok(report)
}

/// Tags a sample by majority vote of its nearest labelled neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnnTagClassifier {
    pub k: usize,
    /// Votes a tag needs; `None` means a strict majority of the neighbours used.
    pub min_votes: Option<usize>,
}

impl Default for KnnTagClassifier {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KnnTagClassifier {
    pub const fn new(k: usize) -> Self {
        Self { k, min_votes: None }
    }

    #[must_use]
    pub const fn with_min_votes(mut self, min_votes: usize) -> Self {
        self.min_votes = Some(min_votes);
        self
    }

    /// Predict tags for an indexed sample from its neighbours, never itself.
    pub fn predict(
        &self,
        engine: &SearchEngine,
        labels: &HashMap<String, BTreeSet<String>>,
        file_name: &str,
    ) -> Result<BTreeSet<String>> {
        let neighbors: Vec<&BTreeSet<String>> = engine
            .query_by_sample(file_name, engine.len())?
            .iter()
            .filter_map(|hit| labels.get(&hit.file_name))
            .take(self.k)
            .collect();
        if neighbors.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for tags in &neighbors {
            for tag in *tags {
                *votes.entry(tag.as_str()).or_default() += 1;
            }
        }
        let threshold = self.min_votes.unwrap_or(neighbors.len() / 2 + 1).max(1);

        Ok(votes
            .into_iter()
            .filter(|&(_, n)| n >= threshold)
            .map(|(tag, _)| tag.to_string())
            .collect())
    }
}

/// Leave-one-out classification quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierReport {
    pub samples: usize,
    pub macro_f1: f64,
}

/// Predict tags for every labelled, indexed sample from the others and
/// score the predictions with macro F1.
pub fn evaluate_classifier(
    engine: &SearchEngine,
    labels: &HashMap<String, BTreeSet<String>>,
    classifier: &KnnTagClassifier,
) -> Result<ClassifierReport> {
    let samples: BTreeSet<&str> = engine
        .table()
        .file_names()
        .filter(|name| labels.contains_key(*name))
        .collect();

    let mut truth = Vec::with_capacity(samples.len());
    let mut predicted = Vec::with_capacity(samples.len());
    for name in &samples {
        if let Some(tags) = labels.get(*name) {
            truth.push(tags.clone());
            predicted.push(classifier.predict(engine, labels, name)?);
        }
    }

    let report = ClassifierReport {
        samples: truth.len(),
        macro_f1: macro_f1(&truth, &predicted),
    };
    log::info!(
        "Tag classifier over {} samples: macro F1 {:.4}",
        report.samples,
        report.macro_f1
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Normalization;
    use crate::table::FeatureTable;
    use soundseek_core::model::FeatureRecord;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn record(name: &str, tempo: f64, centroid: f64) -> FeatureRecord {
        FeatureRecord {
            file_name: name.to_string(),
            file_path: format!("/audio/{name}"),
            duration_sec: 1.0,
            tempo_bpm: tempo,
            estimated_key: "C".to_string(),
            spectral_centroid: centroid,
            spectral_bandwidth: 0.0,
            spectral_rolloff: 0.0,
            mfcc: [0.0; 13],
        }
    }

    fn engine() -> SearchEngine {
        let table = FeatureTable::from_records(&[
            record("kick1.wav", 120.0, 100.0),
            record("kick2.wav", 121.0, 110.0),
            record("kick3.wav", 119.0, 105.0),
            record("pad1.wav", 80.0, 3000.0),
            record("pad2.wav", 82.0, 3100.0),
            record("pad3.wav", 81.0, 3050.0),
        ])
        .unwrap();
        SearchEngine::from_table(table, Normalization::None).unwrap()
    }

    fn labels() -> HashMap<String, BTreeSet<String>> {
        [
            ("kick1.wav", set(&["drum", "kick"])),
            ("kick2.wav", set(&["drum", "kick"])),
            ("kick3.wav", set(&["drum"])),
            ("pad1.wav", set(&["pad", "synth"])),
            ("pad2.wav", set(&["pad"])),
            ("pad3.wav", set(&["pad", "synth"])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_reciprocal_rank() {
        let ranked = ["a", "b", "c"];
        let relevant: HashSet<&str> = ["c"].into_iter().collect();
        assert!((reciprocal_rank(&ranked, &relevant) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(reciprocal_rank(&ranked, &HashSet::new()), 0.0);
    }

    #[test]
    fn test_mean_reciprocal_rank() {
        assert_eq!(mean_reciprocal_rank(&[1.0, 0.5, 0.0]), 0.5);
        assert_eq!(mean_reciprocal_rank(&[]), 0.0);
    }

    #[test]
    fn test_precision_at_k() {
        let ranked = ["a", "b", "c", "d"];
        let relevant: HashSet<&str> = ["a", "d"].into_iter().collect();
        assert_eq!(precision_at_k(&ranked, &relevant, 2), 0.5);
        assert_eq!(precision_at_k(&ranked, &relevant, 4), 0.5);
        assert_eq!(precision_at_k(&ranked[..1], &relevant, 4), 0.25);
        assert_eq!(precision_at_k(&ranked, &relevant, 0), 0.0);
    }

    #[test]
    fn test_macro_f1_perfect_and_partial() {
        let truth = vec![set(&["a"]), set(&["b"]), set(&["a", "b"])];
        assert_eq!(macro_f1(&truth, &truth), 1.0);

        // label a: tp 1, fn 1 -> f1 2/3; label b: tp 2, fp 1 -> f1 0.8
        let predicted = vec![set(&["b"]), set(&["b"]), set(&["a", "b"])];
        let expected = (2.0 / 3.0 + 0.8) / 2.0;
        assert!((macro_f1(&truth, &predicted) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_macro_f1_ignores_labels_only_predicted() {
        let truth = vec![set(&["a"])];
        let predicted = vec![set(&["a", "z"])];
        assert_eq!(macro_f1(&truth, &predicted), 1.0);
        assert_eq!(macro_f1(&[], &[]), 0.0);
    }

    #[test]
    fn test_evaluate_retrieval_clusters() {
        let report = evaluate_retrieval(&engine(), &labels(), 2).unwrap();
        assert_eq!(report.queries, 6);
        assert_eq!(report.mrr, 1.0);
        assert_eq!(report.precision_at_k, 1.0);
    }

    #[test]
    fn test_evaluate_retrieval_skips_unlabelled() {
        let mut labels = labels();
        labels.remove("pad2.wav");
        let report = evaluate_retrieval(&engine(), &labels, 2).unwrap();
        assert_eq!(report.queries, 5);
        assert!(report.precision_at_k < 1.0);
    }

    #[test]
    fn test_knn_majority_vote() {
        let classifier = KnnTagClassifier::new(2);
        let tags = classifier
            .predict(&engine(), &labels(), "kick1.wav")
            .unwrap();
        assert_eq!(tags, set(&["drum"]));

        let loose = KnnTagClassifier::new(2).with_min_votes(1);
        let tags = loose.predict(&engine(), &labels(), "kick1.wav").unwrap();
        assert_eq!(tags, set(&["drum", "kick"]));
    }

    #[test]
    fn test_evaluate_classifier() {
        let report =
            evaluate_classifier(&engine(), &labels(), &KnnTagClassifier::new(2)).unwrap();
        assert_eq!(report.samples, 6);
        // drum and pad are always right, kick and synth never are.
        assert!((report.macro_f1 - 0.5).abs() < 1e-12);
    }
}
