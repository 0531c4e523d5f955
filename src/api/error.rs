//! Error taxonomy for the REST backend.

use std::collections::BTreeMap;

/// Errors produced by the remote resource client.
///
/// Fetch and mutation failures are caught at the call site and turned into a
/// status-line notice; they never crash a view.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
  /// 401 - missing or invalid token. The app redirects to login.
  #[error("not authenticated: {0}")]
  Unauthorized(String),

  /// 403 - role-based denial (e.g. a non-leader creating a team).
  #[error("not authorized: {0}")]
  Forbidden(String),

  /// 404 - resource does not exist (or was soft-deleted).
  #[error("not found: {0}")]
  NotFound(String),

  /// 422 - the backend rejected the payload with field-level messages.
  #[error("validation failed: {}", format_field_errors(.0))]
  Validation(BTreeMap<String, String>),

  /// Any other 4xx.
  #[error("request rejected ({status}): {message}")]
  BadRequest { status: u16, message: String },

  /// 5xx - message extracted from the payload when present.
  #[error("server error ({status}): {message}")]
  ServerError { status: u16, message: String },

  /// Transport failure (DNS, connect, TLS, timeout).
  #[error("network error: {0}")]
  Network(String),

  /// Payload did not match the expected shape.
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl ApiError {
  /// Map an HTTP status and extracted message to the error taxonomy.
  ///
  /// Only called for non-success statuses.
  pub fn from_status(status: u16, message: String) -> Self {
    match status {
      401 => ApiError::Unauthorized(message),
      403 => ApiError::Forbidden(message),
      404 => ApiError::NotFound(message),
      500..=599 => ApiError::ServerError { status, message },
      _ => ApiError::BadRequest { status, message },
    }
  }

  /// Whether this error should flip the access gate back to anonymous.
  pub fn is_auth_failure(&self) -> bool {
    matches!(self, ApiError::Unauthorized(_))
  }

  /// Recover the typed error from an `eyre` report coming out of the cached
  /// read path. A 401 buried in a cache-layer report must still drop the
  /// session; non-API failures fall back to `Network`.
  pub fn from_report(report: color_eyre::eyre::Report) -> Self {
    match report.downcast::<ApiError>() {
      Ok(err) => err,
      Err(other) => ApiError::Network(other.to_string()),
    }
  }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
  errors
    .iter()
    .map(|(field, msg)| format!("{}: {}", field, msg))
    .collect::<Vec<_>>()
    .join(", ")
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Decode(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_mapping() {
    assert!(matches!(
      ApiError::from_status(401, "expired".into()),
      ApiError::Unauthorized(_)
    ));
    assert!(matches!(
      ApiError::from_status(403, "not a leader".into()),
      ApiError::Forbidden(_)
    ));
    assert!(matches!(
      ApiError::from_status(404, "gone".into()),
      ApiError::NotFound(_)
    ));
    assert!(matches!(
      ApiError::from_status(503, "down".into()),
      ApiError::ServerError { status: 503, .. }
    ));
    assert!(matches!(
      ApiError::from_status(409, "conflict".into()),
      ApiError::BadRequest { status: 409, .. }
    ));
  }

  #[test]
  fn test_only_unauthorized_drops_the_session() {
    assert!(ApiError::Unauthorized("".into()).is_auth_failure());
    assert!(!ApiError::Forbidden("".into()).is_auth_failure());
    assert!(!ApiError::Network("".into()).is_auth_failure());
  }

  #[test]
  fn test_validation_message_lists_fields() {
    let mut errors = BTreeMap::new();
    errors.insert("title".to_string(), "Title is required".to_string());
    let err = ApiError::Validation(errors);
    assert!(err.to_string().contains("title: Title is required"));
  }

  #[test]
  fn test_report_round_trip_preserves_taxonomy() {
    let report = color_eyre::eyre::Report::new(ApiError::Unauthorized("expired".into()));
    let err = ApiError::from_report(report);
    assert!(err.is_auth_failure());

    let report = color_eyre::eyre::Report::new(ApiError::Forbidden("not a leader".into()));
    assert!(matches!(
      ApiError::from_report(report),
      ApiError::Forbidden(_)
    ));

    let report = color_eyre::eyre::eyre!("socket closed");
    assert!(matches!(
      ApiError::from_report(report),
      ApiError::Network(_)
    ));
  }
}
