//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, QueryKey};

/// Outcome of an in-flight fetch, broadcast to joined callers.
/// Type-erased to JSON so one map covers every entity type.
type FlightResult = std::result::Result<serde_json::Value, String>;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client. A cached
/// entry is served without touching the network while it is younger than the
/// stale window. Concurrent requests for the same key join the in-flight
/// fetch, so at most one network call per key is ever outstanding.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// In-flight fetches by cache key, joined by concurrent callers
  inflight: Arc<Mutex<HashMap<String, broadcast::Sender<FlightResult>>>>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
      inflight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if within the stale window, return immediately
  /// 2. If another fetch for this key is in flight, join its result
  /// 3. Otherwise fetch from the network and update the cache
  ///
  /// On fetcher failure the error is surfaced to this invocation (and any
  /// joined callers); a previously cached value stays in storage and later
  /// calls proceed normally.
  pub async fn fetch_list<T, K, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_hash();

    // Check cache first
    if let Some(cached) = self.storage.get_query_result::<T>(&hash)? {
      if !self.is_stale(cached.cached_at) {
        return Ok(CacheResult::from_cache(cached.entities, cached.cached_at));
      }
    }

    // Join an in-flight fetch for this key if one exists. Subscribing while
    // holding the map lock guarantees we subscribe before the leader sends.
    let rx = {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      match inflight.get(&hash) {
        Some(tx) => Some(tx.subscribe()),
        None => {
          let (tx, _) = broadcast::channel(1);
          inflight.insert(hash.clone(), tx);
          None
        }
      }
    };

    if let Some(mut rx) = rx {
      debug!(key = %key.description(), "joining in-flight fetch");
      return match rx.recv().await {
        Ok(Ok(value)) => {
          let entities: Vec<T> = serde_json::from_value(value)?;
          Ok(CacheResult::joined(entities))
        }
        Ok(Err(msg)) => Err(eyre!("{}", msg)),
        Err(_) => Err(eyre!("fetch for '{}' was abandoned", key.description())),
      };
    }

    // We are the leader: run the fetch and settle the in-flight entry.
    debug!(key = %key.description(), "fetching from network");
    let result = fetcher().await;

    let tx = {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      inflight.remove(&hash)
    };

    match result {
      Ok(entities) => {
        if let Err(e) = self.storage.store_query_result(&hash, &entities) {
          warn!(key = %key.description(), "failed to persist cache entry: {}", e);
        }
        if let Some(tx) = tx {
          let _ = tx.send(serde_json::to_value(&entities).map_err(|e| e.to_string()));
        }
        Ok(CacheResult::from_network(entities))
      }
      Err(e) => {
        if let Some(tx) = tx {
          let _ = tx.send(Err(e.to_string()));
        }
        Err(e)
      }
    }
  }

  /// Fetch a single entity with caching and in-flight de-duplication.
  pub async fn fetch_one<T, F, Fut>(&self, entity_key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let hash = format!("{}:{}", T::entity_type(), entity_key);

    if let Some(cached) = self.storage.get_entity::<T>(entity_key)? {
      if !self.is_stale(cached.cached_at) {
        return Ok(CacheResult::from_cache(cached.entity, cached.cached_at));
      }
    }

    let rx = {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      match inflight.get(&hash) {
        Some(tx) => Some(tx.subscribe()),
        None => {
          let (tx, _) = broadcast::channel(1);
          inflight.insert(hash.clone(), tx);
          None
        }
      }
    };

    if let Some(mut rx) = rx {
      return match rx.recv().await {
        Ok(Ok(value)) => {
          let entity: T = serde_json::from_value(value)?;
          Ok(CacheResult::joined(entity))
        }
        Ok(Err(msg)) => Err(eyre!("{}", msg)),
        Err(_) => Err(eyre!("fetch for '{}' was abandoned", hash)),
      };
    }

    let result = fetcher().await;

    let tx = {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      inflight.remove(&hash)
    };

    match result {
      Ok(entity) => {
        if let Err(e) = self.storage.store_entity(&entity) {
          warn!(key = %hash, "failed to persist cache entry: {}", e);
        }
        if let Some(tx) = tx {
          let _ = tx.send(serde_json::to_value(&entity).map_err(|e| e.to_string()));
        }
        Ok(CacheResult::from_network(entity))
      }
      Err(e) => {
        if let Some(tx) = tx {
          let _ = tx.send(Err(e.to_string()));
        }
        Err(e)
      }
    }
  }

  /// Discard one query result; the next read for this key refetches.
  pub fn invalidate<K: QueryKey>(&self, key: &K) -> Result<()> {
    debug!(key = %key.description(), "invalidating cache entry");
    self.storage.invalidate(&key.cache_hash())
  }

  /// Discard every query result for an entity type. Used after mutations
  /// whose effect spans all pages/filters of a list.
  pub fn invalidate_type(&self, entity_type: &str) -> Result<()> {
    debug!(entity_type, "invalidating cached queries by type");
    self.storage.invalidate_type(entity_type)
  }

  /// Discard one cached entity (e.g. a detail view after an update).
  pub fn invalidate_entity<T: Cacheable>(&self, entity_key: &str) -> Result<()> {
    self.storage.invalidate_entity(T::entity_type(), entity_key)
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      inflight: Arc::clone(&self.inflight),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use crate::cache::traits::CacheSource;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u64,
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  struct Key(&'static str);

  impl QueryKey for Key {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn entity_type(&self) -> &'static str {
      "item"
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  fn items() -> Vec<Item> {
    vec![Item { id: 1 }, Item { id: 2 }]
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_fetcher() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let result = layer
        .fetch_list(&Key("list"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(items())
        })
        .await
        .unwrap();
      assert_eq!(result.data, items());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_cache_refetches() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::zero());
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      layer
        .fetch_list(&Key("list"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(items())
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_calls_issue_one_fetch() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicU32::new(0));

    let a = {
      let layer = layer.clone();
      let calls = Arc::clone(&calls);
      tokio::spawn(async move {
        layer
          .fetch_list(&Key("list"), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(items())
          })
          .await
      })
    };
    let b = {
      let layer = layer.clone();
      let calls = Arc::clone(&calls);
      tokio::spawn(async move {
        // Give the first caller time to become the leader
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        layer
          .fetch_list(&Key("list"), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(items())
          })
          .await
      })
    };

    let ra = a.await.unwrap().unwrap();
    let rb = b.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ra.data, items());
    assert_eq!(rb.data, items());
    // One caller fetched, the other joined
    let sources = [ra.source, rb.source];
    assert!(sources.contains(&CacheSource::Network));
    assert!(sources.contains(&CacheSource::Joined));
  }

  #[tokio::test]
  async fn test_failure_surfaces_error_and_keeps_cached_value() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::zero());

    layer
      .fetch_list(&Key("list"), || async { Ok(items()) })
      .await
      .unwrap();

    // Stale window is zero, so this call must hit the fetcher; it fails.
    let err = layer
      .fetch_list::<Item, _, _, _>(&Key("list"), || async { Err(eyre!("backend down")) })
      .await;
    assert!(err.is_err());

    // The previous value is still in storage and a later fetch recovers.
    let cached = layer
      .storage
      .get_query_result::<Item>(&Key("list").cache_hash())
      .unwrap()
      .unwrap();
    assert_eq!(cached.entities, items());

    let result = layer
      .fetch_list(&Key("list"), || async { Ok(items()) })
      .await
      .unwrap();
    assert_eq!(result.data, items());
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch_within_stale_window() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      layer
        .fetch_list(&Key("teams"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(items())
        })
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    layer.invalidate(&Key("teams")).unwrap();

    layer
      .fetch_list(&Key("teams"), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(items())
      })
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_one_caches_entity() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let result = layer
        .fetch_one("7", || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(Item { id: 7 })
        })
        .await
        .unwrap();
      assert_eq!(result.data, Item { id: 7 });
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
