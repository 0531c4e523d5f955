//! Cache storage trait and backends.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::Cacheable;

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store entities from a query result.
  fn store_query_result<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>>;

  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>>;

  /// Store a single entity.
  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()>;

  /// Discard one query result so the next read refetches.
  fn invalidate(&self, key: &str) -> Result<()>;

  /// Discard every query result resolving to the given entity type.
  /// Used after mutations whose effect spans all pages/filters of a list.
  fn invalidate_type(&self, entity_type: &str) -> Result<()>;

  /// Discard a single cached entity (e.g. a stale detail view).
  fn invalidate_entity(&self, entity_type: &str, entity_key: &str) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_query_result<T: Cacheable>(&self, _key: &str, _entities: &[T]) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_query_result<T: Cacheable>(&self, _key: &str) -> Result<Option<CachedQueryResult<T>>> {
    Ok(None) // Always miss
  }

  fn get_entity<T: Cacheable>(&self, _entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    Ok(None) // Always miss
  }

  fn store_entity<T: Cacheable>(&self, _entity: &T) -> Result<()> {
    Ok(()) // Discard
  }

  fn invalidate(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn invalidate_type(&self, _entity_type: &str) -> Result<()> {
    Ok(())
  }

  fn invalidate_entity(&self, _entity_type: &str, _entity_key: &str) -> Result<()> {
    Ok(())
  }
}

/// In-memory storage backed by hash maps. Used in tests and available for
/// ephemeral sessions where persisting the cache is unwanted.
#[derive(Default)]
pub struct MemoryStorage {
  // (entity_type, entity_key) -> serialized entity
  entities: Mutex<HashMap<(String, String), (Vec<u8>, DateTime<Utc>)>>,
  // query hash -> (entity_type, serialized entities, cached_at)
  queries: Mutex<HashMap<String, (String, Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn store_query_result<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    let data = serde_json::to_vec(entities)?;
    let mut queries = self.queries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    queries.insert(
      key.to_string(),
      (T::entity_type().to_string(), data, Utc::now()),
    );
    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    let queries = self.queries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match queries.get(key) {
      Some((_, data, cached_at)) => {
        let entities: Vec<T> = serde_json::from_slice(data)?;
        Ok(Some(CachedQueryResult {
          entities,
          cached_at: *cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let entities = self.entities.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match entities.get(&(T::entity_type().to_string(), entity_key.to_string())) {
      Some((data, cached_at)) => {
        let entity: T = serde_json::from_slice(data)?;
        Ok(Some(CachedEntity {
          entity,
          cached_at: *cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let data = serde_json::to_vec(entity)?;
    let mut entities = self.entities.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entities.insert(
      (T::entity_type().to_string(), entity.cache_key()),
      (data, Utc::now()),
    );
    Ok(())
  }

  fn invalidate(&self, key: &str) -> Result<()> {
    let mut queries = self.queries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    queries.remove(key);
    Ok(())
  }

  fn invalidate_type(&self, entity_type: &str) -> Result<()> {
    let mut queries = self.queries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    queries.retain(|_, (ty, _, _)| ty != entity_type);
    Ok(())
  }

  fn invalidate_entity(&self, entity_type: &str, entity_key: &str) -> Result<()> {
    let mut entities = self.entities.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entities.remove(&(entity_type.to_string(), entity_key.to_string()));
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Create an in-memory SQLite storage (used in tests).
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("taskdeck").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, entity_key)
);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_query_cache_type ON query_cache(entity_type);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, entity_key),
    FOREIGN KEY (query_hash) REFERENCES query_cache(query_hash) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    // Delete existing query results
    conn
      .execute(
        "DELETE FROM query_results WHERE query_hash = ?",
        params![key],
      )
      .map_err(|e| eyre!("Failed to delete old query results: {}", e))?;

    // Insert/update query cache
    conn
      .execute(
        "INSERT OR REPLACE INTO query_cache (query_hash, entity_type, cached_at, result_count)
         VALUES (?, ?, datetime('now'), ?)",
        params![key, entity_type, entities.len()],
      )
      .map_err(|e| eyre!("Failed to update query cache: {}", e))?;

    // Store entities and query results
    for (position, entity) in entities.iter().enumerate() {
      let entity_key = entity.cache_key();
      let data =
        serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

      conn
        .execute(
          "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, cached_at)
           VALUES (?, ?, ?, datetime('now'))",
          params![entity_type, entity_key, data],
        )
        .map_err(|e| eyre!("Failed to store entity: {}", e))?;

      conn
        .execute(
          "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position)
           VALUES (?, ?, ?)",
          params![key, entity_key, position],
        )
        .map_err(|e| eyre!("Failed to store query result: {}", e))?;
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get_query_result<T: Cacheable>(
    &self,
    query_hash: &str,
  ) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();

    // Get query metadata
    let mut stmt = conn
      .prepare(
        "SELECT cached_at FROM query_cache
         WHERE query_hash = ? AND entity_type = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let cached_at_str: Option<String> = stmt
      .query_row(params![query_hash, entity_type], |row| row.get(0))
      .ok();

    let cached_at_str = match cached_at_str {
      Some(s) => s,
      None => return Ok(None),
    };

    let cached_at = parse_datetime(&cached_at_str)?;

    // Get entities in order
    let mut stmt = conn
      .prepare(
        "SELECT ec.data FROM entity_cache ec
         INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
         WHERE qr.query_hash = ?
         ORDER BY qr.position",
      )
      .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;

    let entities: Vec<T> = stmt
      .query_map(params![entity_type, query_hash], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })
      .map_err(|e| eyre!("Failed to query entities: {}", e))?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(Some(CachedQueryResult { entities, cached_at }))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM entity_cache
         WHERE entity_type = ? AND entity_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let result: Option<(Vec<u8>, String)> = stmt
      .query_row(params![entity_type, entity_key], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match result {
      Some((data, cached_at_str)) => {
        let entity: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntity { entity, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();
    let key = entity.cache_key();
    let data =
      serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![entity_type, key, data],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(())
  }

  fn invalidate(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM query_results WHERE query_hash = ?",
        params![key],
      )
      .map_err(|e| eyre!("Failed to invalidate query results: {}", e))?;
    conn
      .execute("DELETE FROM query_cache WHERE query_hash = ?", params![key])
      .map_err(|e| eyre!("Failed to invalidate query: {}", e))?;

    Ok(())
  }

  fn invalidate_type(&self, entity_type: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM query_results WHERE query_hash IN
           (SELECT query_hash FROM query_cache WHERE entity_type = ?)",
        params![entity_type],
      )
      .map_err(|e| eyre!("Failed to invalidate query results: {}", e))?;
    conn
      .execute(
        "DELETE FROM query_cache WHERE entity_type = ?",
        params![entity_type],
      )
      .map_err(|e| eyre!("Failed to invalidate queries: {}", e))?;

    Ok(())
  }

  fn invalidate_entity(&self, entity_type: &str, entity_key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM entity_cache WHERE entity_type = ? AND entity_key = ?",
        params![entity_type, entity_key],
      )
      .map_err(|e| eyre!("Failed to invalidate entity: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Widget {
    id: u64,
    name: String,
  }

  impl Cacheable for Widget {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn entity_type() -> &'static str {
      "widget"
    }
  }

  fn widgets() -> Vec<Widget> {
    vec![
      Widget {
        id: 1,
        name: "a".into(),
      },
      Widget {
        id: 2,
        name: "b".into(),
      },
    ]
  }

  #[test]
  fn test_sqlite_store_and_get_preserves_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.store_query_result("k1", &widgets()).unwrap();

    let cached = storage.get_query_result::<Widget>("k1").unwrap().unwrap();
    assert_eq!(cached.entities, widgets());
  }

  #[test]
  fn test_sqlite_invalidate_forces_miss() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.store_query_result("k1", &widgets()).unwrap();

    storage.invalidate("k1").unwrap();
    assert!(storage.get_query_result::<Widget>("k1").unwrap().is_none());
  }

  #[test]
  fn test_sqlite_invalidate_type_clears_all_pages() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.store_query_result("page1", &widgets()).unwrap();
    storage.store_query_result("page2", &widgets()).unwrap();

    storage.invalidate_type("widget").unwrap();
    assert!(storage.get_query_result::<Widget>("page1").unwrap().is_none());
    assert!(storage.get_query_result::<Widget>("page2").unwrap().is_none());
  }

  #[test]
  fn test_memory_entity_round_trip() {
    let storage = MemoryStorage::new();
    let w = Widget {
      id: 9,
      name: "solo".into(),
    };
    storage.store_entity(&w).unwrap();

    let cached = storage.get_entity::<Widget>("9").unwrap().unwrap();
    assert_eq!(cached.entity, w);

    storage.invalidate_entity("widget", "9").unwrap();
    assert!(storage.get_entity::<Widget>("9").unwrap().is_none());
  }
}
