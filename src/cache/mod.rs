//! Generic caching layer for the remote resources.
//!
//! Provides a resource-agnostic query cache that:
//! - Serves cached entries within a configurable stale window
//! - De-duplicates concurrent fetches for the same key (in-flight join)
//! - Supports explicit invalidation by key or entity type after mutations

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};
