//! Bearer-token verification and subject assembly.
//!
//! Tokens are HS256 JWTs carrying the user id in `sub` and an optional role
//! claim. A verified token only names a user; the live row decides whether
//! that user may proceed.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
  errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AuthError, NormalizedRole, Result, Subject, normalize, store::UserStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// User id.
  pub sub:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  pub iat:  i64,
  pub exp:  i64,
}

/// Signs development and test tokens with the server's shared secret.
pub struct TokenIssuer {
  key: EncodingKey,
  ttl: TimeDelta,
}

impl TokenIssuer {
  pub fn new(secret: &str, ttl: TimeDelta) -> Self {
    Self { key: EncodingKey::from_secret(secret.as_bytes()), ttl }
  }

  pub fn issue(&self, user_id: Uuid, role: Option<&str>) -> jsonwebtoken::errors::Result<String> {
    self.issue_at(user_id, role, Utc::now())
  }

  pub fn issue_at(
    &self,
    user_id: Uuid,
    role: Option<&str>,
    issued_at: DateTime<Utc>,
  ) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
      sub:  user_id.to_string(),
      role: role.map(str::to_owned),
      iat:  issued_at.timestamp(),
      exp:  (issued_at + self.ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.key)
  }
}

/// The identity a verified token asserts, before the live lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
  pub user_id: Uuid,
  pub role:    Option<NormalizedRole>,
}

pub struct CredentialValidator {
  key:        DecodingKey,
  validation: Validation,
}

impl CredentialValidator {
  pub fn new(secret: &str) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);
    Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
  }

  /// Check signature and expiry.
  pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
    let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
      match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::CredentialExpired,
        _ => AuthError::InvalidCredential,
      }
    })?;
    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidCredential)?;
    Ok(VerifiedToken { user_id, role: normalize(data.claims.role.as_deref()) })
  }

  /// Turn the request's bearer token into a live [`Subject`].
  ///
  /// On success a detached task stamps the user's last activity; its failure
  /// is logged and otherwise ignored.
  pub async fn authenticate<S>(&self, store: &Arc<S>, headers: &HeaderMap) -> Result<Subject>
  where
    S: UserStore + 'static,
  {
    let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;
    let verified = self.verify(token)?;

    let row = store
      .get_user(verified.user_id)
      .await
      .map_err(AuthError::store)?
      .ok_or(AuthError::SubjectVanished)?;

    if !row.status.is_active() {
      tracing::warn!(user = %row.id, status = %row.status, "inactive account presented a valid token");
      return Err(AuthError::AccountNotActive(row.status));
    }

    let subject = Subject::from_live(verified.role, row);

    let store = Arc::clone(store);
    let id = subject.id;
    tokio::spawn(async move {
      if let Err(e) = store.touch_last_activity(id).await {
        tracing::warn!(user = %id, error = %e, "failed to update last activity");
      }
    });

    Ok(subject)
  }
}

/// The token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;
  use warden_core::Role;

  use super::*;

  const SECRET: &str = "correct horse battery staple";

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn bearer_scheme_is_required() {
    assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
    assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
    assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
    assert_eq!(bearer_token(&headers("Bearer ")), None);
    assert_eq!(bearer_token(&HeaderMap::new()), None);
  }

  #[test]
  fn issued_token_verifies_with_normalised_role() {
    let id = Uuid::new_v4();
    let token = TokenIssuer::new(SECRET, TimeDelta::hours(1))
      .issue(id, Some("Principal Lecturer"))
      .unwrap();
    let verified = CredentialValidator::new(SECRET).verify(&token).unwrap();
    assert_eq!(verified.user_id, id);
    assert_eq!(verified.role, Some(NormalizedRole::Known(Role::Prl)));
  }

  #[test]
  fn expired_token_is_distinguished_from_invalid() {
    let issuer = TokenIssuer::new(SECRET, TimeDelta::minutes(5));
    let stale = issuer
      .issue_at(Uuid::new_v4(), None, Utc::now() - TimeDelta::hours(1))
      .unwrap();
    assert!(matches!(
      CredentialValidator::new(SECRET).verify(&stale),
      Err(AuthError::CredentialExpired)
    ));
  }

  #[test]
  fn wrong_secret_or_garbage_is_invalid() {
    let token = TokenIssuer::new("other secret", TimeDelta::hours(1))
      .issue(Uuid::new_v4(), None)
      .unwrap();
    let validator = CredentialValidator::new(SECRET);
    assert!(matches!(validator.verify(&token), Err(AuthError::InvalidCredential)));
    assert!(matches!(validator.verify("not-a-jwt"), Err(AuthError::InvalidCredential)));
  }

  #[test]
  fn non_uuid_subject_is_invalid() {
    let now = Utc::now().timestamp();
    let claims = Claims { sub: "42".into(), role: None, iat: now, exp: now + 600 };
    let token = encode(
      &Header::new(Algorithm::HS256),
      &claims,
      &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    assert!(matches!(
      CredentialValidator::new(SECRET).verify(&token),
      Err(AuthError::InvalidCredential)
    ));
  }
}
