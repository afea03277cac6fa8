//! Errors surfaced by remote calls.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// A failed remote call. The service's own message is kept intact.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The service rejected the request before doing anything (malformed field, bad filter, ...).
  #[error("request rejected ({status}): {message}")]
  RemoteValidation { status: u16, message: String },

  /// The referenced build, trigger or object does not exist.
  #[error("not found: {message}")]
  NotFound { message: String },

  /// A resource with the same name already exists.
  #[error("already exists: {message}")]
  AlreadyExists { message: String },

  /// The credentials were rejected or lack permission.
  #[error("permission denied ({status}): {message}")]
  PermissionDenied { status: u16, message: String },

  /// Any other non-success status.
  #[error("service error ({status}): {message}")]
  Remote { status: u16, message: String },

  /// The request did not complete (connection, TLS, timeout). Never retried.
  #[error("request failed: {0}")]
  Transient(#[source] reqwest::Error),

  /// The response could not be understood.
  #[error("unexpected response: {0}")]
  Decode(String),

  #[error("invalid URL '{url}': {message}")]
  InvalidUrl { url: String, message: String },
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: String,
}

impl ApiError {
  /// Map a non-success response onto the error taxonomy.
  pub fn from_response(status: StatusCode, body: &str) -> Self {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
      Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
      _ if body.trim().is_empty() => status.canonical_reason().unwrap_or("no details").to_string(),
      _ => body.trim().to_string(),
    };
    let status = status.as_u16();

    match status {
      400 | 412 | 422 => ApiError::RemoteValidation { status, message },
      401 | 403 => ApiError::PermissionDenied { status, message },
      404 => ApiError::NotFound { message },
      409 => ApiError::AlreadyExists { message },
      _ => ApiError::Remote { status, message },
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }

  pub fn is_already_exists(&self) -> bool {
    matches!(self, ApiError::AlreadyExists { .. })
  }

  pub fn is_transient(&self) -> bool {
    matches!(self, ApiError::Transient(_))
  }

  /// HTTP status, when the service answered.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::RemoteValidation { status, .. }
      | ApiError::PermissionDenied { status, .. }
      | ApiError::Remote { status, .. } => Some(*status),
      ApiError::NotFound { .. } => Some(404),
      ApiError::AlreadyExists { .. } => Some(409),
      ApiError::Transient(e) => e.status().map(|s| s.as_u16()),
      ApiError::Decode(_) | ApiError::InvalidUrl { .. } => None,
    }
  }
}
