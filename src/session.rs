//! Session state: the bearer token and the role derived from it.
//!
//! The browser original kept the token in shared local storage; here it is an
//! explicit injected store, persisted to one JSON file in the user data
//! directory, with read/clear operations passed to whatever needs them.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::api::types::Role;

/// The two states of the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
  Anonymous,
  Authenticated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
  token: String,
  #[serde(default)]
  role: Role,
}

/// Process-wide session store. One active session per client instance.
///
/// Cloning shares the underlying state; every outgoing request reads the
/// token through a clone of this store, so a logout is observed by the next
/// request even if an earlier one is still in flight.
#[derive(Clone)]
pub struct SessionStore {
  inner: Arc<RwLock<Option<PersistedSession>>>,
  /// Persistence location; None keeps the session in memory only (tests)
  path: Option<PathBuf>,
}

impl SessionStore {
  /// Load the persisted session, if any. Determines the initial gate state.
  pub fn load() -> Result<Self> {
    let path = Self::default_path()?;
    let session = match std::fs::read_to_string(&path) {
      Ok(contents) => serde_json::from_str(&contents).ok(),
      Err(_) => None,
    };

    if session.is_some() {
      info!("restored session from {}", path.display());
    }

    Ok(Self {
      inner: Arc::new(RwLock::new(session)),
      path: Some(path),
    })
  }

  /// A store that never touches the filesystem.
  pub fn in_memory() -> Self {
    Self {
      inner: Arc::new(RwLock::new(None)),
      path: None,
    }
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("taskdeck").join("session.json"))
  }

  /// The bearer token, if a session is active.
  pub fn token(&self) -> Option<String> {
    self
      .inner
      .read()
      .ok()
      .and_then(|guard| guard.as_ref().map(|s| s.token.clone()))
  }

  /// The role of the active session; defaults to `Member` when anonymous.
  pub fn role(&self) -> Role {
    self
      .inner
      .read()
      .ok()
      .and_then(|guard| guard.as_ref().map(|s| s.role))
      .unwrap_or_default()
  }

  /// Current gate state, derived from token presence.
  pub fn auth_state(&self) -> AuthState {
    if self.token().is_some() {
      AuthState::Authenticated
    } else {
      AuthState::Anonymous
    }
  }

  /// Store a new session (login/register success) and persist it.
  pub fn store(&self, token: String, role: Role) -> Result<()> {
    let session = PersistedSession { token, role };

    if let Some(path) = &self.path {
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
          .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
      }
      let contents = serde_json::to_string(&session)?;
      std::fs::write(path, contents)
        .map_err(|e| eyre!("Failed to persist session to {}: {}", path.display(), e))?;
    }

    let mut guard = self
      .inner
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *guard = Some(session);
    info!("session stored, gate now authenticated");
    Ok(())
  }

  /// Clear the session (logout or auth failure). Always succeeds in memory;
  /// removing the persisted file is best-effort.
  pub fn clear(&self) {
    if let Ok(mut guard) = self.inner.write() {
      *guard = None;
    }
    if let Some(path) = &self.path {
      let _ = std::fs::remove_file(path);
    }
    info!("session cleared, gate now anonymous");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_initial_state_is_anonymous() {
    let store = SessionStore::in_memory();
    assert_eq!(store.auth_state(), AuthState::Anonymous);
    assert_eq!(store.token(), None);
    assert_eq!(store.role(), Role::Member);
  }

  #[test]
  fn test_store_transitions_to_authenticated() {
    let store = SessionStore::in_memory();
    store.store("tok-123".into(), Role::Leader).unwrap();

    assert_eq!(store.auth_state(), AuthState::Authenticated);
    assert_eq!(store.token(), Some("tok-123".into()));
    assert_eq!(store.role(), Role::Leader);
  }

  #[test]
  fn test_clear_transitions_to_anonymous() {
    let store = SessionStore::in_memory();
    store.store("tok-123".into(), Role::Member).unwrap();
    store.clear();

    assert_eq!(store.auth_state(), AuthState::Anonymous);
    assert_eq!(store.token(), None);
  }

  #[test]
  fn test_clones_share_state() {
    let store = SessionStore::in_memory();
    let reader = store.clone();
    store.store("tok-456".into(), Role::Member).unwrap();

    // A request holding a clone observes the logout
    assert_eq!(reader.token(), Some("tok-456".into()));
    store.clear();
    assert_eq!(reader.token(), None);
  }
}
