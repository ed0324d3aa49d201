pub mod diversity;
pub mod experiment;
pub mod generator;
pub mod profile;
pub mod similarity;
pub mod tracker;
pub mod trending;

pub use experiment::ExperimentService;
pub use generator::RecommendationService;
pub use profile::ProfileBuilder;
pub use similarity::{ItemSimilarityEngine, UserSimilarityEngine};
pub use tracker::Tracker;
pub use trending::TrendingEngine;
