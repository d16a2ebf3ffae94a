//! Dataset-wide aggregation of per-record metrics.

use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;

use super::scoring::EntityMetrics;
use crate::models::Record;

/// Number of most frequent missing/hallucinated entities reported.
pub const TOP_N: usize = 5;

/// Which per-record metric set to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricVariant {
    Drug,
    NormalizedDrug,
    Regimen,
}

impl MetricVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drug => "drug",
            Self::NormalizedDrug => "normalized_drug",
            Self::Regimen => "regimen",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Drug => "Drug Metrics (raw)",
            Self::NormalizedDrug => "Drug Metrics (normalized)",
            Self::Regimen => "Regimen Metrics",
        }
    }

    fn entity_label(&self) -> &'static str {
        match self {
            Self::Drug | Self::NormalizedDrug => "Drugs",
            Self::Regimen => "Regimens",
        }
    }

    pub fn select<'a>(&self, record: &'a Record) -> &'a EntityMetrics {
        match self {
            Self::Drug => &record.drug_metrics,
            Self::NormalizedDrug => &record.normalized_drug_metrics,
            Self::Regimen => &record.regimen_metrics,
        }
    }
}

impl std::fmt::Display for MetricVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCount {
    pub entity: String,
    pub count: usize,
}

/// Means and top error counts for one metric variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantSummary {
    pub variant: MetricVariant,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: f64,
    pub top_missing: Vec<EntityCount>,
    pub top_hallucinated: Vec<EntityCount>,
}

impl VariantSummary {
    pub fn from_records(variant: MetricVariant, records: &[Record]) -> Self {
        let metrics: Vec<&EntityMetrics> = records.iter().map(|r| variant.select(r)).collect();

        Self {
            variant,
            mean_precision: mean(metrics.iter().map(|m| m.precision)),
            mean_recall: mean(metrics.iter().map(|m| m.recall)),
            mean_f1: mean(metrics.iter().map(|m| m.f1)),
            top_missing: most_common(metrics.iter().flat_map(|m| m.missing.iter()), TOP_N),
            top_hallucinated: most_common(
                metrics.iter().flat_map(|m| m.hallucinated.iter()),
                TOP_N,
            ),
        }
    }
}

/// Aggregate view of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub record_count: usize,
    pub degraded_count: usize,
    pub drug: VariantSummary,
    pub normalized_drug: VariantSummary,
    pub regimen: VariantSummary,
}

impl DatasetSummary {
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            record_count: records.len(),
            degraded_count: records.iter().filter(|r| r.is_degraded()).count(),
            drug: VariantSummary::from_records(MetricVariant::Drug, records),
            normalized_drug: VariantSummary::from_records(MetricVariant::NormalizedDrug, records),
            regimen: VariantSummary::from_records(MetricVariant::Regimen, records),
        }
    }

    /// Human-readable report of all three variants.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Records: {} ({} with extraction errors)",
            self.record_count, self.degraded_count
        );
        for variant in [&self.drug, &self.normalized_drug, &self.regimen] {
            render_variant(&mut out, variant);
        }
        out
    }
}

fn render_variant(out: &mut String, summary: &VariantSummary) {
    let label = summary.variant.entity_label();
    let _ = writeln!(out, "\n{}:", summary.variant.title());
    let _ = writeln!(out, "Precision: {:.3}", summary.mean_precision);
    let _ = writeln!(out, "Recall: {:.3}", summary.mean_recall);
    let _ = writeln!(out, "F1 Score: {:.3}", summary.mean_f1);

    let _ = writeln!(out, "\nTop {TOP_N} Most Common Missing {label}:");
    for c in &summary.top_missing {
        let _ = writeln!(out, "{}: {} times", c.entity, c.count);
    }
    let _ = writeln!(out, "\nTop {TOP_N} Most Common Hallucinated {label}:");
    for c in &summary.top_hallucinated {
        let _ = writeln!(out, "{}: {} times", c.entity, c.count);
    }
}

/// Arithmetic mean, 0.0 for an empty input.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Top `n` entities by count; equal counts keep first-seen order.
fn most_common<'a>(entities: impl Iterator<Item = &'a String>, n: usize) -> Vec<EntityCount> {
    let mut counts: Vec<EntityCount> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for entity in entities {
        match index.get(entity.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(entity.as_str(), counts.len());
                counts.push(EntityCount {
                    entity: entity.clone(),
                    count: 1,
                });
            }
        }
    }
    // Stable sort keeps first-seen order among ties.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}
