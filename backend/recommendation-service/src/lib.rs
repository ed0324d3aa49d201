pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

pub use config::RecommendationConfig;
pub use error::{RecommendationError, Result};
pub use services::{
    ExperimentService, ItemSimilarityEngine, ProfileBuilder, RecommendationService, Tracker,
    TrendingEngine, UserSimilarityEngine,
};
