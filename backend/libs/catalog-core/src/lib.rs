pub mod cache;
pub mod error;
pub mod memory;
pub mod models;
pub mod retry;
pub mod store;

pub use cache::{Cache, CacheExt, RedisCache};
pub use error::{CacheError, StoreError};
pub use memory::{InMemoryStore, MemoryCache};
pub use retry::retry_read_once;
pub use store::CatalogStore;
