pub mod autocomplete;
pub mod facets;
pub mod filters;
pub mod fuzzy;
pub mod ranker;
pub mod search;

pub use search::SearchService;
