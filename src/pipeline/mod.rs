pub mod normalize;
pub mod metrics;
pub mod checkpoint;
pub mod generation;
pub mod batch_extraction;
