//! Set-based precision/recall/F1 for one extracted list against ground truth.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Scores for one entity list, plus the entities responsible for misses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Ground-truth entities not extracted, in ground-truth order and casing.
    pub missing: Vec<String>,
    /// Extracted entities absent from ground truth, in extraction order and casing.
    pub hallucinated: Vec<String>,
}

/// Comparison form of an entity: trimmed and lowercased.
pub fn normalize_entity(entity: &str) -> String {
    entity.trim().to_lowercase()
}

/// Normalize every entity and drop the blank ones.
pub fn normalize_entity_list<S: AsRef<str>>(entities: &[S]) -> Vec<String> {
    entities
        .iter()
        .map(|e| normalize_entity(e.as_ref()))
        .filter(|e| !e.is_empty())
        .collect()
}

/// Score `extracted` against `ground_truth`.
///
/// Empty extracted gives precision 0, empty ground truth gives recall 0, and
/// F1 is 0 when both are 0. No NaN is ever produced.
pub fn compute_entity_metrics<E: AsRef<str>, G: AsRef<str>>(
    extracted: &[E],
    ground_truth: &[G],
) -> EntityMetrics {
    let extracted_set: HashSet<String> = normalize_entity_list(extracted).into_iter().collect();
    let truth_set: HashSet<String> = normalize_entity_list(ground_truth).into_iter().collect();

    let true_positives = extracted_set.intersection(&truth_set).count();

    let precision = if extracted_set.is_empty() {
        0.0
    } else {
        true_positives as f64 / extracted_set.len() as f64
    };
    let recall = if truth_set.is_empty() {
        0.0
    } else {
        true_positives as f64 / truth_set.len() as f64
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let missing = ground_truth
        .iter()
        .map(|s| s.as_ref())
        .filter(|g| {
            let n = normalize_entity(g);
            !n.is_empty() && !extracted_set.contains(&n)
        })
        .map(str::to_string)
        .collect();
    let hallucinated = extracted
        .iter()
        .map(|s| s.as_ref())
        .filter(|e| {
            let n = normalize_entity(e);
            !n.is_empty() && !truth_set.contains(&n)
        })
        .map(str::to_string)
        .collect();

    EntityMetrics {
        precision,
        recall,
        f1,
        missing,
        hallucinated,
    }
}
