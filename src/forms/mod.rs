//! Form state and validation.
//!
//! Binds input fields to a values object and re-runs the schema on every
//! change and blur. Submission stays blocked while any field is invalid or
//! nothing has been touched yet.

mod rules;
pub mod schemas;

pub use rules::{Field, Rule, Schema, Validation, Values};

use std::collections::BTreeSet;

/// State of one form: values, touched set, current validation result.
#[derive(Debug, Clone)]
pub struct FormState {
  schema: Schema,
  values: Values,
  touched: BTreeSet<String>,
  validation: Validation,
  dirty: bool,
}

impl FormState {
  pub fn new(schema: Schema) -> Self {
    let values: Values = schema
      .field_names()
      .map(|name| (name.to_string(), String::new()))
      .collect();
    let validation = schema.validate(&values);
    Self {
      schema,
      values,
      touched: BTreeSet::new(),
      validation,
      dirty: false,
    }
  }

  /// Prefill values (edit forms). Does not mark the form dirty, so a
  /// prefilled form still needs a user change before it can submit.
  pub fn prefill(&mut self, values: Values) {
    for (name, value) in values {
      self.values.insert(name, value);
    }
    self.validation = self.schema.validate(&self.values);
  }

  pub fn value(&self, field: &str) -> &str {
    self.values.get(field).map(String::as_str).unwrap_or("")
  }

  /// Change a field value; re-validates immediately.
  pub fn set_value(&mut self, field: &str, value: impl Into<String>) {
    self.values.insert(field.to_string(), value.into());
    self.touched.insert(field.to_string());
    self.dirty = true;
    self.validation = self.schema.validate(&self.values);
  }

  /// Mark a field as visited; its error becomes visible.
  pub fn blur(&mut self, field: &str) {
    self.touched.insert(field.to_string());
    self.validation = self.schema.validate(&self.values);
  }

  pub fn is_valid(&self) -> bool {
    self.validation.is_valid()
  }

  /// Submission gate: blocked while invalid or untouched.
  pub fn can_submit(&self) -> bool {
    self.dirty && self.validation.is_valid()
  }

  /// Error for a field, only once the field has been touched.
  pub fn visible_error(&self, field: &str) -> Option<&str> {
    if self.touched.contains(field) {
      self.validation.error(field)
    } else {
      None
    }
  }

  /// Error regardless of touched state (used after a submit attempt).
  pub fn error(&self, field: &str) -> Option<&str> {
    self.validation.error(field)
  }

  /// Mark every field touched so all errors show (failed submit attempt).
  pub fn touch_all(&mut self) {
    let names: Vec<_> = self.schema.field_names().collect();
    for name in names {
      self.touched.insert(name.to_string());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema() -> Schema {
    Schema::new(vec![
      Field::new("title").required("Title is required"),
      Field::new("end_date").rule(
        Rule::DateOnOrAfter("start_date"),
        "End date must be after start date",
      ),
      Field::new("start_date"),
    ])
  }

  #[test]
  fn test_untouched_form_cannot_submit_even_if_valid_looking() {
    let mut form = FormState::new(schema());
    form.prefill(
      [("title".to_string(), "prefilled".to_string())]
        .into_iter()
        .collect(),
    );
    assert!(form.is_valid());
    assert!(!form.can_submit());
  }

  #[test]
  fn test_errors_hidden_until_touched() {
    let mut form = FormState::new(schema());
    assert_eq!(form.visible_error("title"), None);

    form.blur("title");
    assert_eq!(form.visible_error("title"), Some("Title is required"));
  }

  #[test]
  fn test_relational_rule_rechecked_when_either_side_changes() {
    let mut form = FormState::new(schema());
    form.set_value("title", "t");
    form.set_value("start_date", "2024-05-01");
    form.set_value("end_date", "2024-05-03");
    assert!(form.can_submit());

    // Moving the start date past the end date flips validity
    form.set_value("start_date", "2024-05-04");
    assert!(!form.can_submit());
    assert_eq!(
      form.error("end_date"),
      Some("End date must be after start date")
    );

    form.set_value("end_date", "2024-05-04");
    assert!(form.can_submit());
  }

  #[test]
  fn test_touch_all_reveals_every_error() {
    let mut form = FormState::new(schema());
    form.touch_all();
    assert_eq!(form.visible_error("title"), Some("Title is required"));
  }
}
