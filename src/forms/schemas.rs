//! Validation schemas for the application's forms, one per screen,
//! plus the team -> assignee cascade rule.

use crate::api::types::Member;

use super::rules::{Field, Rule, Schema};
use super::FormState;

pub fn login_schema() -> Schema {
  Schema::new(vec![
    Field::new("email")
      .required("Email is required")
      .rule(Rule::Email, "Email is invalid"),
    password_field(),
  ])
}

pub fn register_schema() -> Schema {
  Schema::new(vec![
    Field::new("name")
      .required("Name is required")
      .rule(Rule::MinLen(3), "Min length is 3 chars")
      .rule(Rule::MaxLen(20), "Max length is 20 chars"),
    Field::new("email")
      .required("Email is required")
      .rule(Rule::Email, "Email is invalid"),
    password_field(),
    Field::new("password_confirmation")
      .required("Password confirmation is required")
      .rule(Rule::MatchesField("password"), "Passwords must match"),
    Field::new("role")
      .required("Role is required")
      .rule(
        Rule::OneOf(&["leader", "member"]),
        "Role must be either leader or member",
      ),
  ])
}

pub fn task_schema() -> Schema {
  Schema::new(vec![
    Field::new("title").required("Title is required"),
    Field::new("description").required("Description is required"),
    Field::new("start_date")
      .required("Start date is required")
      .rule(Rule::Date, "Start date is invalid"),
    Field::new("end_date")
      .required("End date is required")
      .rule(Rule::Date, "End date is invalid")
      .rule(
        Rule::DateOnOrAfter("start_date"),
        "End date must be after start date",
      ),
    Field::new("status")
      .required("Status is required")
      .rule(
        Rule::OneOf(&["not started", "in progress", "completed"]),
        "Invalid status",
      ),
    Field::new("priority")
      .required("Priority is required")
      .rule(Rule::OneOf(&["low", "medium", "high"]), "Invalid priority"),
    Field::new("category_id").required("Category is required"),
    Field::new("team_id").required("Team is required"),
    Field::new("user_id").required("User is required when a team is selected"),
  ])
}

pub fn team_schema() -> Schema {
  Schema::new(vec![Field::new("name").required("Team name is required")])
}

fn password_field() -> Field {
  Field::new("password")
    .required("Password is required")
    .rule(Rule::MinLen(6), "Password must be at least 6 characters")
    .rule(Rule::HasDigit, "Password must contain at least one number")
    .rule(
      Rule::HasSpecial,
      "Password must contain at least one special character",
    )
}

/// Cascade for the task form: when the selected team changes, the member
/// list is refetched and the assignee resets to a deterministic default -
/// the first member, or empty when the team has none.
pub fn reset_assignee(form: &mut FormState, members: &[Member]) {
  let default = members
    .first()
    .map(|m| m.id.to_string())
    .unwrap_or_default();
  form.set_value("user_id", default);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_password_rules_mirror_the_registration_policy() {
    let mut form = FormState::new(login_schema());
    form.set_value("email", "dev@example.com");

    form.set_value("password", "abcdef");
    assert_eq!(
      form.error("password"),
      Some("Password must contain at least one number")
    );

    form.set_value("password", "abcdef1");
    assert_eq!(
      form.error("password"),
      Some("Password must contain at least one special character")
    );

    form.set_value("password", "abcdef1!");
    assert!(form.can_submit());
  }

  #[test]
  fn test_task_schema_accepts_equal_start_and_end_dates() {
    let mut form = FormState::new(task_schema());
    form.set_value("title", "Deploy");
    form.set_value("description", "Release day");
    form.set_value("start_date", "2024-06-01");
    form.set_value("end_date", "2024-06-01");
    form.set_value("status", "not started");
    form.set_value("priority", "high");
    form.set_value("category_id", "1");
    form.set_value("team_id", "2");
    form.set_value("user_id", "3");
    assert!(form.can_submit());

    form.set_value("end_date", "2024-05-31");
    assert!(!form.can_submit());
  }

  #[test]
  fn test_assignee_resets_to_first_member() {
    let mut form = FormState::new(task_schema());
    form.set_value("team_id", "2");

    let members = vec![
      Member {
        id: 11,
        name: "Ada".into(),
        email: None,
      },
      Member {
        id: 12,
        name: "Grace".into(),
        email: None,
      },
    ];
    reset_assignee(&mut form, &members);
    assert_eq!(form.value("user_id"), "11");
  }

  #[test]
  fn test_assignee_cleared_when_team_has_no_members() {
    let mut form = FormState::new(task_schema());
    form.set_value("team_id", "2");
    form.set_value("user_id", "11");

    reset_assignee(&mut form, &[]);
    assert_eq!(form.value("user_id"), "");
    assert_eq!(
      form.error("user_id"),
      Some("User is required when a team is selected")
    );
  }

  #[test]
  fn test_register_requires_matching_confirmation() {
    let mut form = FormState::new(register_schema());
    form.set_value("name", "Dev");
    form.set_value("email", "dev@example.com");
    form.set_value("password", "abcdef1!");
    form.set_value("password_confirmation", "abcdef1?");
    form.set_value("role", "member");
    assert!(!form.can_submit());

    form.set_value("password_confirmation", "abcdef1!");
    assert!(form.can_submit());
  }
}
