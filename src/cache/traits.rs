//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g. task id, team id)
  fn cache_key(&self) -> String;

  /// Entity type name for storage organization (e.g. "task", "team")
  fn entity_type() -> &'static str;
}

/// Trait for cache lookup keys.
///
/// A key fingerprints a (resource, parameters) pair - the same resource
/// fetched with different pagination or search terms caches separately.
pub trait QueryKey {
  /// Stable, fixed-length hash used as the storage key.
  fn cache_hash(&self) -> String;

  /// Entity type this key resolves to, for type-wide invalidation.
  fn entity_type(&self) -> &'static str;

  /// Human-readable description for logging.
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Create a result for a caller that joined another caller's in-flight fetch.
  pub fn joined(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Joined,
      cached_at: None,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from a network fetch this caller issued
  Network,
  /// Data served from cache within the stale window
  Cache,
  /// Data from a concurrent fetch this caller joined
  Joined,
}
