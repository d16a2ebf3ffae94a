pub mod scoring;
pub mod summary;

pub use scoring::{compute_entity_metrics, normalize_entity, normalize_entity_list, EntityMetrics};
pub use summary::{DatasetSummary, EntityCount, MetricVariant, VariantSummary, TOP_N};
