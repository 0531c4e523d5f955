//! Route table and access gating.
//!
//! Routes are partitioned by the access they require: most need an active
//! session and fall back to the login view when the gate is anonymous;
//! login/register are for anonymous users only and bounce an authenticated
//! session back to the task list.

use crate::session::AuthState;

/// Navigable screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  /// The home view: the live task list
  Tasks,
  TaskCreate,
  TaskEdit(u64),
  DeletedTasks,
  Categories,
  Teams,
  TeamDetail(u64),
  TeamCreate,
  Login,
  Register,
}

/// Access requirement of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  /// Requires an active session; redirects to login otherwise
  Authenticated,
  /// Only reachable without a session; redirects home otherwise
  Anonymous,
}

impl Route {
  pub fn access(&self) -> Access {
    match self {
      Route::Login | Route::Register => Access::Anonymous,
      _ => Access::Authenticated,
    }
  }
}

/// Resolve a navigation request against the access gate.
///
/// Returns the route actually shown: the requested one when permitted, or
/// the redirect target when the gate disagrees.
pub fn resolve(requested: Route, auth: AuthState) -> Route {
  match (requested.access(), auth) {
    (Access::Authenticated, AuthState::Anonymous) => Route::Login,
    (Access::Anonymous, AuthState::Authenticated) => Route::Tasks,
    _ => requested,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_protected_route_redirects_to_login_when_anonymous() {
    assert_eq!(resolve(Route::Tasks, AuthState::Anonymous), Route::Login);
    assert_eq!(resolve(Route::Teams, AuthState::Anonymous), Route::Login);
    assert_eq!(
      resolve(Route::TaskEdit(3), AuthState::Anonymous),
      Route::Login
    );
  }

  #[test]
  fn test_protected_route_passes_when_authenticated() {
    assert_eq!(
      resolve(Route::Tasks, AuthState::Authenticated),
      Route::Tasks
    );
    assert_eq!(
      resolve(Route::TeamDetail(4), AuthState::Authenticated),
      Route::TeamDetail(4)
    );
  }

  #[test]
  fn test_anonymous_route_redirects_home_when_authenticated() {
    assert_eq!(
      resolve(Route::Login, AuthState::Authenticated),
      Route::Tasks
    );
    assert_eq!(
      resolve(Route::Register, AuthState::Authenticated),
      Route::Tasks
    );
  }

  #[test]
  fn test_anonymous_route_passes_when_anonymous() {
    assert_eq!(resolve(Route::Login, AuthState::Anonymous), Route::Login);
    assert_eq!(
      resolve(Route::Register, AuthState::Anonymous),
      Route::Register
    );
  }
}
