//! HTTP rendering of access failures.
//!
//! Every failure leaves the server as `{"error": <message>}` with the status
//! assigned to its kind. Store faults are logged and replaced by a generic
//! message.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use warden_core::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("{0}")]
  BadRequest(String),

  #[error("Request body too large")]
  PayloadTooLarge,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Auth(e) => match e {
        AuthError::MissingCredential | AuthError::AuthenticationRequired => {
          StatusCode::UNAUTHORIZED
        }
        AuthError::InvalidCredential
        | AuthError::CredentialExpired
        | AuthError::SubjectVanished
        | AuthError::AccountNotActive(_)
        | AuthError::InsufficientRole { .. }
        | AuthError::CrossFacultyAccessDenied
        | AuthError::CrossDepartmentAccessDenied
        | AuthError::OwnershipDenied(_) => StatusCode::FORBIDDEN,
        AuthError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::Auth(AuthError::Store(e)) => {
        tracing::error!(error = %e, "store failure during access check");
        "Internal server error".to_owned()
      }
      other => other.to_string(),
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if let ApiError::Auth(AuthError::RateLimitExceeded { retry_after_secs }) = self {
      res
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    }
    res
  }
}
