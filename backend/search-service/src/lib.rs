pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod services;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use index::{IndexHandle, SearchIndex};
pub use models::{FacetCount, Facets, SearchFilters, SearchResults, Suggestion, SuggestionKind};
pub use services::SearchService;
