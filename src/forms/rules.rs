//! Declarative field validation rules.
//!
//! A schema is a list of per-field checks evaluated against a string-keyed
//! values map, mirroring the validation schemas of the original client.
//! Apart from `Required`, rules only fire on non-empty values.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Values object a schema validates against.
pub type Values = BTreeMap<String, String>;

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// A single validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
  Required,
  Email,
  MinLen(usize),
  MaxLen(usize),
  HasDigit,
  HasSpecial,
  OneOf(&'static [&'static str]),
  Date,
  /// Relational: this date must not precede the named field's date.
  /// Equal dates are valid. Re-checked whenever either side changes.
  DateOnOrAfter(&'static str),
  /// Relational: must equal the named field (password confirmation).
  MatchesField(&'static str),
}

impl Rule {
  fn check(&self, value: &str, values: &Values) -> bool {
    if value.is_empty() && !matches!(self, Rule::Required) {
      return true;
    }
    match self {
      Rule::Required => !value.trim().is_empty(),
      Rule::Email => {
        let Some((local, domain)) = value.split_once('@') else {
          return false;
        };
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
      }
      Rule::MinLen(min) => value.chars().count() >= *min,
      Rule::MaxLen(max) => value.chars().count() <= *max,
      Rule::HasDigit => value.chars().any(|c| c.is_ascii_digit()),
      Rule::HasSpecial => value.chars().any(|c| SPECIAL_CHARS.contains(c)),
      Rule::OneOf(options) => options.contains(&value),
      Rule::Date => parse_date(value).is_some(),
      Rule::DateOnOrAfter(other) => {
        let other_value = values.get(*other).map(String::as_str).unwrap_or("");
        match (parse_date(value), parse_date(other_value)) {
          (Some(this), Some(that)) => this >= that,
          // An unparseable side is reported by its own Date rule
          _ => true,
        }
      }
      Rule::MatchesField(other) => {
        values.get(*other).map(String::as_str).unwrap_or("") == value
      }
    }
  }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Checks for a single field, each with its error message.
#[derive(Debug, Clone)]
pub struct Field {
  name: &'static str,
  checks: Vec<(Rule, &'static str)>,
}

impl Field {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      checks: Vec::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn rule(mut self, rule: Rule, message: &'static str) -> Self {
    self.checks.push((rule, message));
    self
  }

  pub fn required(self, message: &'static str) -> Self {
    self.rule(Rule::Required, message)
  }
}

/// A declarative validation schema: one [`Field`] per input.
#[derive(Debug, Clone)]
pub struct Schema {
  fields: Vec<Field>,
}

impl Schema {
  pub fn new(fields: Vec<Field>) -> Self {
    Self { fields }
  }

  pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.fields.iter().map(|f| f.name)
  }

  /// Run every check; the first failing check per field wins.
  pub fn validate(&self, values: &Values) -> Validation {
    let mut errors = BTreeMap::new();

    for field in &self.fields {
      let value = values.get(field.name).map(String::as_str).unwrap_or("");
      for (rule, message) in &field.checks {
        if !rule.check(value, values) {
          errors.insert(field.name.to_string(), message.to_string());
          break;
        }
      }
    }

    Validation { errors }
  }
}

/// Outcome of a schema run: field-keyed errors.
#[derive(Debug, Clone, Default)]
pub struct Validation {
  pub errors: BTreeMap<String, String>,
}

impl Validation {
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn error(&self, field: &str) -> Option<&str> {
    self.errors.get(field).map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn values(pairs: &[(&str, &str)]) -> Values {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_required_rejects_blank() {
    let schema = Schema::new(vec![Field::new("title").required("Title is required")]);

    let result = schema.validate(&values(&[("title", "   ")]));
    assert_eq!(result.error("title"), Some("Title is required"));

    let result = schema.validate(&values(&[("title", "Ship it")]));
    assert!(result.is_valid());
  }

  #[test]
  fn test_rules_skip_empty_optional_values() {
    let schema = Schema::new(vec![
      Field::new("email").rule(Rule::Email, "Email is invalid")
    ]);
    assert!(schema.validate(&values(&[("email", "")])).is_valid());
    assert!(!schema.validate(&values(&[("email", "nope")])).is_valid());
    assert!(schema
      .validate(&values(&[("email", "a@b.co")]))
      .is_valid());
  }

  #[test]
  fn test_end_date_before_start_date_is_invalid() {
    let schema = Schema::new(vec![Field::new("end_date").rule(
      Rule::DateOnOrAfter("start_date"),
      "End date must be after start date",
    )]);

    let result = schema.validate(&values(&[
      ("start_date", "2024-03-10"),
      ("end_date", "2024-03-09"),
    ]));
    assert_eq!(
      result.error("end_date"),
      Some("End date must be after start date")
    );
  }

  #[test]
  fn test_end_date_equal_to_start_date_is_valid() {
    let schema = Schema::new(vec![Field::new("end_date").rule(
      Rule::DateOnOrAfter("start_date"),
      "End date must be after start date",
    )]);

    let result = schema.validate(&values(&[
      ("start_date", "2024-03-10"),
      ("end_date", "2024-03-10"),
    ]));
    assert!(result.is_valid());
  }

  #[test]
  fn test_first_failing_check_wins() {
    let schema = Schema::new(vec![Field::new("password")
      .required("Password is required")
      .rule(Rule::MinLen(6), "Password must be at least 6 characters")
      .rule(Rule::HasDigit, "Password must contain at least one number")]);

    let result = schema.validate(&values(&[("password", "abc")]));
    assert_eq!(
      result.error("password"),
      Some("Password must be at least 6 characters")
    );
  }

  #[test]
  fn test_matches_field() {
    let schema = Schema::new(vec![Field::new("password_confirmation").rule(
      Rule::MatchesField("password"),
      "Passwords must match",
    )]);

    let result = schema.validate(&values(&[
      ("password", "hunter2!"),
      ("password_confirmation", "hunter3!"),
    ]));
    assert_eq!(
      result.error("password_confirmation"),
      Some("Passwords must match")
    );
  }
}
