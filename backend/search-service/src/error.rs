use catalog_core::{CacheError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("validation error: {0}")]
    Validation(String),

    /// The index could not be built even after a synchronous rebuild attempt.
    #[error("search index unavailable")]
    IndexUnavailable,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
