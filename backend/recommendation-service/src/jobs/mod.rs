pub mod batch;

pub use batch::{BatchConfig, BatchJobStats, RecommendationBatchJob};
