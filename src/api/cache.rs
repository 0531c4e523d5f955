//! Caching implementations for the backend resources.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::types::{Category, CategoryPage, Member, Task, Team};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Task {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "task"
  }
}

impl Cacheable for Team {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "team"
  }
}

impl Cacheable for Category {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "category"
  }
}

impl Cacheable for Member {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "member"
  }
}

impl Cacheable for CategoryPage {
  fn cache_key(&self) -> String {
    format!("page:{}", self.page)
  }

  fn entity_type() -> &'static str {
    "category_page"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Cache keys for the backend's list resources.
///
/// Each variant fingerprints a (resource, parameters) pair; the same resource
/// fetched with a different page or search term caches under its own key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKey {
  /// Live tasks, paginated, optionally filtered by a search term
  Tasks { page: u32, search: Option<String> },
  /// Soft-deleted tasks
  DeletedTasks,
  /// The per-user "recently visited" category sub-view
  RecentCategories,
  /// All teams visible to the session
  Teams,
  /// Members of one team
  TeamMembers { team_id: u64 },
  /// All users (for member selection)
  Users,
}

impl QueryKey for ResourceKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Tasks { page, search } => format!(
        "tasks:{}:{}",
        page,
        search.as_deref().map(normalize_search).unwrap_or_default()
      ),
      Self::DeletedTasks => "tasks:deleted".to_string(),
      Self::RecentCategories => "categories:recent".to_string(),
      Self::Teams => "teams".to_string(),
      Self::TeamMembers { team_id } => format!("team_members:{}", team_id),
      Self::Users => "users".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn entity_type(&self) -> &'static str {
    match self {
      Self::Tasks { .. } | Self::DeletedTasks => "task",
      Self::RecentCategories => "category",
      Self::Teams => "team",
      Self::TeamMembers { .. } => "member",
      Self::Users => "member",
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Tasks { page, search } => {
        if let Some(s) = search {
          format!("tasks page {} matching '{}'", page, s)
        } else {
          format!("tasks page {}", page)
        }
      }
      Self::DeletedTasks => "deleted tasks".to_string(),
      Self::RecentCategories => "recently visited categories".to_string(),
      Self::Teams => "teams".to_string(),
      Self::TeamMembers { team_id } => format!("members of team {}", team_id),
      Self::Users => "users".to_string(),
    }
  }
}

/// Normalize a search term for consistent hashing.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_search(search: &str) -> String {
  search.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_search_term_normalized_in_hash() {
    let a = ResourceKey::Tasks {
      page: 1,
      search: Some("  Urgent ".into()),
    };
    let b = ResourceKey::Tasks {
      page: 1,
      search: Some("urgent".into()),
    };
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_different_pages_hash_differently() {
    let a = ResourceKey::Tasks {
      page: 1,
      search: None,
    };
    let b = ResourceKey::Tasks {
      page: 2,
      search: None,
    };
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_team_member_keys_are_per_team() {
    let a = ResourceKey::TeamMembers { team_id: 1 };
    let b = ResourceKey::TeamMembers { team_id: 2 };
    assert_ne!(a.cache_hash(), b.cache_hash());
    assert_eq!(a.entity_type(), "member");
  }
}
