//! Error taxonomy for access decisions.
//!
//! Every variant maps to exactly one HTTP status in `warden-api`. The
//! `Display` strings double as the user-facing `{"error": ...}` message, so
//! they never carry resource fields.

use thiserror::Error;

use crate::{resource::ResourceKind, role::Role, subject::AccountStatus};

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("Access token required")]
  MissingCredential,

  #[error("Invalid token")]
  InvalidCredential,

  #[error("Token expired")]
  CredentialExpired,

  #[error("User not found")]
  SubjectVanished,

  #[error("Account is {0}")]
  AccountNotActive(AccountStatus),

  #[error("Authentication required")]
  AuthenticationRequired,

  #[error("Access denied. Required roles: {}. Your role: {actual}", join_roles(.allowed))]
  InsufficientRole { allowed: Vec<Role>, actual: String },

  #[error("Access denied: cannot access data from another faculty")]
  CrossFacultyAccessDenied,

  #[error("Access denied: cannot access data from another department")]
  CrossDepartmentAccessDenied,

  #[error("{} not found", .0.label())]
  ResourceNotFound(ResourceKind),

  #[error("Access denied: you do not have access to this {0}")]
  OwnershipDenied(ResourceKind),

  #[error("Too many requests, please try again later")]
  RateLimitExceeded { retry_after_secs: u64 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
  /// Box any backend error into [`AuthError::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

fn join_roles(roles: &[Role]) -> String {
  roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;
