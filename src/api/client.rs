//! REST client for the task management backend.
//!
//! Issues authenticated calls against `/api/v1`, attaching the bearer token
//! from the session store when one is present. Maps response statuses onto
//! the [`ApiError`] taxonomy. Never touches the cache.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::session::SessionStore;

use super::error::ApiError;
use super::types::{
  AuthResponse, Category, Member, Page, Task, TaskPayload, Team,
};

/// Detail endpoints wrap their resource in a `data` envelope.
#[derive(Debug, serde::Deserialize)]
struct Wrapped<T> {
  data: T,
}

/// Backend API client.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  session: SessionStore,
}

impl ApiClient {
  pub fn new(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| ApiError::Decode(format!("invalid base URL '{}': {}", config.api.base_url, e)))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base_url,
      session,
    })
  }

  pub fn session(&self) -> &SessionStore {
    &self.session
  }

  /// Issue a request against the API, returning the raw JSON payload.
  ///
  /// `path` is relative to the `/api/v1` base. The bearer token is attached
  /// when the session holds one and omitted otherwise.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
    params: &[(&str, String)],
  ) -> Result<Value, ApiError> {
    let mut url = self
      .base_url
      .join(&format!("api/v1/{}", path.trim_start_matches('/')))
      .map_err(|e| ApiError::Decode(format!("invalid path '{}': {}", path, e)))?;

    for (name, value) in params {
      url.query_pairs_mut().append_pair(name, value);
    }

    debug!(%method, %url, "api request");

    let mut builder = self.http.request(method, url);
    if let Some(token) = self.session.token() {
      builder = builder.bearer_auth(token);
    }
    if let Some(body) = body {
      builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
      if text.trim().is_empty() {
        // DELETE and logout endpoints answer with an empty body
        return Ok(Value::Null);
      }
      return Ok(serde_json::from_str(&text)?);
    }

    Err(error_from_response(status, &text))
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, ApiError> {
    let value = self.request(Method::GET, path, None, params).await?;
    Ok(serde_json::from_value(value)?)
  }

  async fn send<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
  ) -> Result<T, ApiError> {
    let value = self.request(method, path, body, &[]).await?;
    Ok(serde_json::from_value(value)?)
  }

  // ==========================================================================
  // Auth
  // ==========================================================================

  pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
    let body = serde_json::json!({ "email": email, "password": password });
    self.send(Method::POST, "login", Some(&body)).await
  }

  pub async fn register(
    &self,
    name: &str,
    email: &str,
    password: &str,
    password_confirmation: &str,
    role: &str,
  ) -> Result<AuthResponse, ApiError> {
    let body = serde_json::json!({
      "name": name,
      "email": email,
      "password": password,
      "password_confirmation": password_confirmation,
      "role": role,
    });
    self.send(Method::POST, "register", Some(&body)).await
  }

  /// Remote logout. Callers treat failures as best-effort; the local session
  /// is cleared regardless.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let body = serde_json::json!({});
    self.request(Method::POST, "logout", Some(&body), &[]).await?;
    Ok(())
  }

  // ==========================================================================
  // Tasks
  // ==========================================================================

  pub async fn list_tasks(&self, page: u32, search: Option<&str>) -> Result<Page<Task>, ApiError> {
    let mut params = vec![("page", page.to_string())];
    if let Some(search) = search {
      params.push(("search", search.to_string()));
    }
    self.get("tasks", &params).await
  }

  pub async fn deleted_tasks(&self) -> Result<Page<Task>, ApiError> {
    self.get("tasks/deleted", &[]).await
  }

  pub async fn get_task(&self, id: u64) -> Result<Task, ApiError> {
    let wrapped: Wrapped<Task> = self.get(&format!("tasks/{}", id), &[]).await?;
    Ok(wrapped.data)
  }

  pub async fn create_task(&self, payload: &TaskPayload) -> Result<Task, ApiError> {
    let body = serde_json::to_value(payload)?;
    let wrapped: Wrapped<Task> = self.send(Method::POST, "tasks", Some(&body)).await?;
    Ok(wrapped.data)
  }

  pub async fn update_task(&self, id: u64, payload: &TaskPayload) -> Result<Task, ApiError> {
    let body = serde_json::to_value(payload)?;
    let wrapped: Wrapped<Task> = self
      .send(Method::PUT, &format!("tasks/{}", id), Some(&body))
      .await?;
    Ok(wrapped.data)
  }

  pub async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
    self
      .request(Method::DELETE, &format!("tasks/{}", id), None, &[])
      .await?;
    Ok(())
  }

  pub async fn restore_task(&self, id: u64) -> Result<(), ApiError> {
    self
      .request(Method::PATCH, &format!("tasks/{}/restore", id), None, &[])
      .await?;
    Ok(())
  }

  // ==========================================================================
  // Categories
  // ==========================================================================

  pub async fn list_categories(&self, page: u32) -> Result<Page<Category>, ApiError> {
    self
      .get("categories", &[("page", page.to_string())])
      .await
  }

  pub async fn get_category(&self, id: u64) -> Result<Category, ApiError> {
    let wrapped: Wrapped<Category> = self.get(&format!("categories/{}", id), &[]).await?;
    Ok(wrapped.data)
  }

  pub async fn recently_visited_categories(&self) -> Result<Page<Category>, ApiError> {
    self.get("categories/recently-visited", &[]).await
  }

  // ==========================================================================
  // Teams
  // ==========================================================================

  pub async fn list_teams(&self) -> Result<Page<Team>, ApiError> {
    self.get("teams", &[]).await
  }

  /// Create a team. The backend answers 403 when the session role is not
  /// leader; that surfaces as `ApiError::Forbidden`.
  pub async fn create_team(&self, name: &str) -> Result<Team, ApiError> {
    let body = serde_json::json!({ "name": name });
    let wrapped: Wrapped<Team> = self.send(Method::POST, "teams/create", Some(&body)).await?;
    Ok(wrapped.data)
  }

  pub async fn delete_team(&self, id: u64) -> Result<(), ApiError> {
    self
      .request(Method::DELETE, &format!("teams/{}", id), None, &[])
      .await?;
    Ok(())
  }

  pub async fn team_members(&self, team_id: u64) -> Result<Vec<Member>, ApiError> {
    let page: Page<Member> = self.get(&format!("teams/{}/members", team_id), &[]).await?;
    Ok(page.data)
  }

  pub async fn add_team_member(&self, team_id: u64, user_id: u64) -> Result<(), ApiError> {
    self
      .request(
        Method::POST,
        &format!("teams/{}/members/{}", team_id, user_id),
        None,
        &[],
      )
      .await?;
    Ok(())
  }

  pub async fn remove_team_member(&self, team_id: u64, user_id: u64) -> Result<(), ApiError> {
    self
      .request(
        Method::DELETE,
        &format!("teams/{}/members/{}", team_id, user_id),
        None,
        &[],
      )
      .await?;
    Ok(())
  }

  // ==========================================================================
  // Users
  // ==========================================================================

  pub async fn list_users(&self) -> Result<Vec<Member>, ApiError> {
    let page: Page<Member> = self.get("users", &[]).await?;
    Ok(page.data)
  }
}

/// Build an [`ApiError`] from a non-success response.
///
/// Pulls `message` from the payload when present; 422 responses carry a
/// field-keyed `errors` object which becomes `ApiError::Validation`.
fn error_from_response(status: StatusCode, body: &str) -> ApiError {
  let payload: Option<Value> = serde_json::from_str(body).ok();

  if status == StatusCode::UNPROCESSABLE_ENTITY {
    if let Some(errors) = payload.as_ref().and_then(|v| v.get("errors")).and_then(Value::as_object) {
      let fields: BTreeMap<String, String> = errors
        .iter()
        .filter_map(|(field, messages)| {
          let first = match messages {
            Value::Array(list) => list.first().and_then(Value::as_str),
            Value::String(s) => Some(s.as_str()),
            _ => None,
          };
          first.map(|msg| (field.clone(), msg.to_string()))
        })
        .collect();
      return ApiError::Validation(fields);
    }
  }

  let message = payload
    .as_ref()
    .and_then(|v| v.get("message"))
    .and_then(Value::as_str)
    .map(String::from)
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
    });

  ApiError::from_status(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_message_extracted_from_payload() {
    let err = error_from_response(
      StatusCode::FORBIDDEN,
      r#"{"message":"you are not a team leader"}"#,
    );
    match err {
      ApiError::Forbidden(msg) => assert_eq!(msg, "you are not a team leader"),
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn test_error_falls_back_to_canonical_reason() {
    let err = error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
    match err {
      ApiError::ServerError { status, message } => {
        assert_eq!(status, 500);
        assert_eq!(message, "Internal Server Error");
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn test_unprocessable_entity_maps_field_errors() {
    let err = error_from_response(
      StatusCode::UNPROCESSABLE_ENTITY,
      r#"{"message":"The given data was invalid.","errors":{"title":["The title field is required."]}}"#,
    );
    match err {
      ApiError::Validation(fields) => {
        assert_eq!(
          fields.get("title").map(String::as_str),
          Some("The title field is required.")
        );
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }
}
