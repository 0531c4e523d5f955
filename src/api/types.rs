//! Domain types for the task management backend.
//!
//! These deserialize straight off the wire; the backend speaks plain JSON
//! with snake_case fields.

use serde::{Deserialize, Serialize};

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
  #[serde(rename = "not started")]
  NotStarted,
  #[serde(rename = "in progress")]
  InProgress,
  #[serde(rename = "completed")]
  Completed,
}

impl TaskStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskStatus::NotStarted => "not started",
      TaskStatus::InProgress => "in progress",
      TaskStatus::Completed => "completed",
    }
  }

  pub const ALL: &'static [TaskStatus] = &[
    TaskStatus::NotStarted,
    TaskStatus::InProgress,
    TaskStatus::Completed,
  ];
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High,
}

impl Priority {
  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::Low => "low",
      Priority::Medium => "medium",
      Priority::High => "high",
    }
  }

  pub const ALL: &'static [Priority] = &[Priority::Low, Priority::Medium, Priority::High];
}

/// Role derived from the session; leaders may create and delete teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Leader,
  #[default]
  Member,
}

/// A task as returned by `GET /tasks` and `GET /tasks/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub start_date: String,
  pub end_date: String,
  pub status: TaskStatus,
  pub priority: Priority,
  pub category_id: Option<u64>,
  pub team_id: Option<u64>,
  pub user_id: Option<u64>,
  /// Soft-delete timestamp; set for entries from `GET /tasks/deleted`.
  #[serde(default)]
  pub deleted_at: Option<String>,
}

/// Payload for task create (`POST /tasks`) and update (`PUT /tasks/{id}`).
#[derive(Debug, Clone, Serialize)]
pub struct TaskPayload {
  pub title: String,
  pub description: String,
  pub start_date: String,
  pub end_date: String,
  pub status: TaskStatus,
  pub priority: Priority,
  pub category_id: u64,
  pub team_id: u64,
  pub user_id: Option<u64>,
}

/// A team with its ordered member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub members: Vec<Member>,
}

/// A team member (also the shape of `GET /users` entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub email: Option<String>,
}

/// A task category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  pub id: u64,
  pub name: String,
}

/// Response from `POST /login` and `POST /register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
  pub access_token: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub role: Option<Role>,
}

/// A pagination link from `meta.links`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
  pub label: String,
  pub url: Option<String>,
  pub active: bool,
}

/// Pagination metadata attached to list payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
  #[serde(default)]
  pub links: Vec<PageLink>,
}

/// A paginated list payload: `data` plus `meta.links`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
  pub data: Vec<T>,
  #[serde(default)]
  pub meta: PageMeta,
}

/// One page of the category listing, cached as a unit so the page controls
/// survive a cache hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPage {
  pub page: u32,
  pub data: Vec<Category>,
  pub links: Vec<PageLink>,
}

impl CategoryPage {
  /// Page numbers usable as controls. The backend mixes "previous"/"next"
  /// markers into `links`; only links with a numeric label become buttons.
  pub fn page_numbers(&self) -> Vec<u32> {
    self
      .links
      .iter()
      .filter_map(|link| link.label.trim().parse().ok())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_numbers_exclude_non_numeric_labels() {
    let page = CategoryPage {
      page: 1,
      data: Vec::new(),
      links: vec![
        PageLink {
          label: "&laquo; Previous".into(),
          url: None,
          active: false,
        },
        PageLink {
          label: "1".into(),
          url: Some("http://localhost:8000/api/v1/categories?page=1".into()),
          active: true,
        },
        PageLink {
          label: "2".into(),
          url: Some("http://localhost:8000/api/v1/categories?page=2".into()),
          active: false,
        },
        PageLink {
          label: "Next &raquo;".into(),
          url: Some("http://localhost:8000/api/v1/categories?page=2".into()),
          active: false,
        },
      ],
    };

    assert_eq!(page.page_numbers(), vec![1, 2]);
  }

  #[test]
  fn test_status_round_trip() {
    let json = serde_json::to_string(&TaskStatus::NotStarted).unwrap();
    assert_eq!(json, "\"not started\"");
    let status: TaskStatus = serde_json::from_str("\"in progress\"").unwrap();
    assert_eq!(status, TaskStatus::InProgress);
  }

  #[test]
  fn test_task_deserializes_without_deleted_at() {
    let json = r#"{
      "id": 7, "title": "Ship it", "description": "d",
      "start_date": "2024-01-01", "end_date": "2024-01-05",
      "status": "completed", "priority": "high",
      "category_id": 1, "team_id": 2, "user_id": 3
    }"#;
    let task: Task = serde_json::from_str(json).unwrap();
    assert_eq!(task.deleted_at, None);
    assert_eq!(task.priority, Priority::High);
  }
}
