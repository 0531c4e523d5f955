//! Cached API client wrapping [`ApiClient`] with transparent caching.
//!
//! Reads go through the cache layer; writes go straight to the network and,
//! on success only, invalidate the cache keys their effect touches. On a
//! failed write the cache is left untouched and the error is surfaced for
//! presentation.

use chrono::Duration;
use color_eyre::Result;
use tracing::warn;

use crate::cache::{CacheLayer, CacheStorage, QueryKey};
use crate::session::SessionStore;

use super::cache::ResourceKey;
use super::client::ApiClient;
use super::error::ApiError;
use super::types::{
  Category, CategoryPage, Member, Role, Task, TaskPayload, Team,
};

/// API client with transparent caching support.
///
/// Generic over the storage backend: SQLite in the app, in-memory in tests,
/// no-op when caching is disabled.
pub struct CachedApiClient<S: CacheStorage> {
  inner: ApiClient,
  cache: CacheLayer<S>,
}

// Manual Clone: the storage sits behind an Arc in the cache layer, so no
// S: Clone bound is needed.
impl<S: CacheStorage> Clone for CachedApiClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}

impl<S: CacheStorage> CachedApiClient<S> {
  pub fn new(inner: ApiClient, storage: S, stale_time: Duration) -> Self {
    let cache = CacheLayer::new(storage).with_stale_time(stale_time);
    Self { inner, cache }
  }

  pub fn session(&self) -> &SessionStore {
    self.inner.session()
  }

  // ==========================================================================
  // Auth - bypasses the cache, drives the access gate
  // ==========================================================================

  /// Log in and store the session on success.
  pub async fn login(&self, email: &str, password: &str) -> Result<Role, ApiError> {
    let response = self.inner.login(email, password).await?;
    let role = response.role.unwrap_or_default();
    if let Err(e) = self.session().store(response.access_token, role) {
      warn!("failed to persist session: {}", e);
    }
    Ok(role)
  }

  /// Register and store the session on success.
  pub async fn register(
    &self,
    name: &str,
    email: &str,
    password: &str,
    password_confirmation: &str,
    role: &str,
  ) -> Result<Role, ApiError> {
    let response = self
      .inner
      .register(name, email, password, password_confirmation, role)
      .await?;
    let role = response.role.unwrap_or_default();
    if let Err(e) = self.session().store(response.access_token, role) {
      warn!("failed to persist session: {}", e);
    }
    Ok(role)
  }

  /// Log out: the remote call is best-effort, the local session is cleared
  /// unconditionally. Any request still in flight completes against the old
  /// token and its result is discarded by the gate transition.
  pub async fn logout(&self) {
    if let Err(e) = self.inner.logout().await {
      warn!("remote logout failed (ignored): {}", e);
    }
    self.session().clear();
  }

  // ==========================================================================
  // Cached reads
  // ==========================================================================

  pub async fn tasks(&self, page: u32, search: Option<&str>) -> Result<Vec<Task>> {
    let key = ResourceKey::Tasks {
      page,
      search: search.map(String::from),
    };

    let result = self
      .cache
      .fetch_list(&key, || {
        let inner = self.inner.clone();
        let search = search.map(String::from);
        async move { Ok(inner.list_tasks(page, search.as_deref()).await?.data) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn deleted_tasks(&self) -> Result<Vec<Task>> {
    let result = self
      .cache
      .fetch_list(&ResourceKey::DeletedTasks, || {
        let inner = self.inner.clone();
        async move { Ok(inner.deleted_tasks().await?.data) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn task(&self, id: u64) -> Result<Task> {
    let result = self
      .cache
      .fetch_one(&id.to_string(), || {
        let inner = self.inner.clone();
        async move { Ok(inner.get_task(id).await?) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn categories(&self, page: u32) -> Result<CategoryPage> {
    let result = self
      .cache
      .fetch_one(&format!("page:{}", page), || {
        let inner = self.inner.clone();
        async move {
          let fetched = inner.list_categories(page).await?;
          Ok(CategoryPage {
            page,
            data: fetched.data,
            links: fetched.meta.links,
          })
        }
      })
      .await?;

    Ok(result.data)
  }

  /// Fetch a single category directly. The backend records the visit, so
  /// the recently-visited list is stale afterwards and gets invalidated.
  pub async fn visit_category(&self, id: u64) -> Result<Category, ApiError> {
    let category = self.inner.get_category(id).await?;
    self.invalidate_key(&ResourceKey::RecentCategories);
    Ok(category)
  }

  pub async fn recent_categories(&self) -> Result<Vec<Category>> {
    let result = self
      .cache
      .fetch_list(&ResourceKey::RecentCategories, || {
        let inner = self.inner.clone();
        async move { Ok(inner.recently_visited_categories().await?.data) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn teams(&self) -> Result<Vec<Team>> {
    let result = self
      .cache
      .fetch_list(&ResourceKey::Teams, || {
        let inner = self.inner.clone();
        async move { Ok(inner.list_teams().await?.data) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn team_members(&self, team_id: u64) -> Result<Vec<Member>> {
    let result = self
      .cache
      .fetch_list(&ResourceKey::TeamMembers { team_id }, || {
        let inner = self.inner.clone();
        async move { Ok(inner.team_members(team_id).await?) }
      })
      .await?;

    Ok(result.data)
  }

  pub async fn users(&self) -> Result<Vec<Member>> {
    let result = self
      .cache
      .fetch_list(&ResourceKey::Users, || {
        let inner = self.inner.clone();
        async move { Ok(inner.list_users().await?) }
      })
      .await?;

    Ok(result.data)
  }

  // ==========================================================================
  // Mutations - write through, invalidate on success
  // ==========================================================================

  pub async fn create_task(&self, payload: &TaskPayload) -> Result<Task, ApiError> {
    let task = self.inner.create_task(payload).await?;
    self.invalidate_task_lists();
    Ok(task)
  }

  pub async fn update_task(&self, id: u64, payload: &TaskPayload) -> Result<Task, ApiError> {
    let task = self.inner.update_task(id, payload).await?;
    self.invalidate_task_lists();
    self.invalidate_entity::<Task>(&id.to_string());
    Ok(task)
  }

  pub async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
    self.inner.delete_task(id).await?;
    self.invalidate_task_lists();
    self.invalidate_entity::<Task>(&id.to_string());
    Ok(())
  }

  pub async fn restore_task(&self, id: u64) -> Result<(), ApiError> {
    self.inner.restore_task(id).await?;
    // Restoring moves the task between the live and deleted lists
    self.invalidate_task_lists();
    self.invalidate_entity::<Task>(&id.to_string());
    Ok(())
  }

  pub async fn create_team(&self, name: &str) -> Result<Team, ApiError> {
    // A 403 (not a leader) propagates here with the cache untouched
    let team = self.inner.create_team(name).await?;
    self.invalidate_key(&ResourceKey::Teams);
    Ok(team)
  }

  pub async fn delete_team(&self, id: u64) -> Result<(), ApiError> {
    self.inner.delete_team(id).await?;
    self.invalidate_key(&ResourceKey::Teams);
    self.invalidate_key(&ResourceKey::TeamMembers { team_id: id });
    Ok(())
  }

  pub async fn add_team_member(&self, team_id: u64, user_id: u64) -> Result<(), ApiError> {
    self.inner.add_team_member(team_id, user_id).await?;
    self.invalidate_key(&ResourceKey::TeamMembers { team_id });
    self.invalidate_key(&ResourceKey::Teams);
    Ok(())
  }

  pub async fn remove_team_member(&self, team_id: u64, user_id: u64) -> Result<(), ApiError> {
    self.inner.remove_team_member(team_id, user_id).await?;
    self.invalidate_key(&ResourceKey::TeamMembers { team_id });
    self.invalidate_key(&ResourceKey::Teams);
    Ok(())
  }

  // A failed invalidation only logs: the entry still expires with the stale
  // window, so the worst case is a briefly outdated list.

  fn invalidate_key(&self, key: &ResourceKey) {
    if let Err(e) = self.cache.invalidate(key) {
      warn!(key = %key.description(), "cache invalidation failed: {}", e);
    }
  }

  /// Task mutations affect every page/filter of both task lists.
  fn invalidate_task_lists(&self) {
    if let Err(e) = self.cache.invalidate_type("task") {
      warn!("cache invalidation failed: {}", e);
    }
  }

  fn invalidate_entity<T: crate::cache::Cacheable>(&self, entity_key: &str) {
    if let Err(e) = self.cache.invalidate_entity::<T>(entity_key) {
      warn!(entity_key, "cache invalidation failed: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::config::{ApiConfig, CacheConfig, Config, RefreshConfig};

  // Port 9 (discard) refuses the connection, so every network call fails
  fn unreachable_client(storage: MemoryStorage) -> CachedApiClient<MemoryStorage> {
    let config = Config {
      api: ApiConfig {
        base_url: "http://127.0.0.1:9/".to_string(),
      },
      refresh: RefreshConfig::default(),
      cache: CacheConfig::default(),
    };
    let api = ApiClient::new(&config, SessionStore::in_memory()).unwrap();
    CachedApiClient::new(api, storage, Duration::minutes(5))
  }

  #[tokio::test]
  async fn test_failed_team_creation_leaves_cached_list_untouched() {
    let storage = MemoryStorage::new();
    let seeded = vec![Team {
      id: 1,
      name: "core".to_string(),
      members: Vec::new(),
    }];
    storage
      .store_query_result(&ResourceKey::Teams.cache_hash(), &seeded)
      .unwrap();

    let client = unreachable_client(storage);
    let err = client.create_team("ops").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));

    // The seeded entry is still fresh, so this read never hits the network
    let teams = client.teams().await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].name, "core");
  }

  #[tokio::test]
  async fn test_failed_task_deletion_leaves_cached_list_untouched() {
    let storage = MemoryStorage::new();
    let seeded = vec![Task {
      id: 4,
      title: "Ship it".to_string(),
      description: String::new(),
      start_date: "2024-01-01".to_string(),
      end_date: "2024-01-05".to_string(),
      status: crate::api::types::TaskStatus::InProgress,
      priority: crate::api::types::Priority::High,
      category_id: None,
      team_id: None,
      user_id: None,
      deleted_at: None,
    }];
    let key = ResourceKey::Tasks {
      page: 1,
      search: None,
    };
    storage.store_query_result(&key.cache_hash(), &seeded).unwrap();

    let client = unreachable_client(storage);
    assert!(client.delete_task(4).await.is_err());

    let tasks = client.tasks(1, None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Ship it");
  }
}
