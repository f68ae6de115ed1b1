//! The guard chain as axum middleware.
//!
//! Each guard is a `from_fn_with_state` function. [`require_auth`] runs first
//! on every protected route and leaves the [`Subject`] in the request
//! extensions; the rest read it from there. [`require_ownership`] also leaves
//! the fetched [`Resource`] behind for the handler.

use std::collections::HashMap;

use axum::{
  body::Body,
  extract::{FromRequestParts, Path, Query, Request, State},
  http::{HeaderMap, HeaderValue, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use uuid::Uuid;
use warden_core::{
  AuthError, Role, Subject,
  guard::{check_department, check_faculty, check_role},
  ownership,
  ratelimit::RateDecision,
  resource::{Resource, ResourceKind},
};

use crate::{AppState, Store, error::ApiError};

/// Largest JSON body the scope guard will buffer.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

// ─── Extractor ────────────────────────────────────────────────────────────────

/// The subject placed in the extensions by [`require_auth`].
pub struct CurrentSubject(pub Subject);

impl<S> FromRequestParts<S> for CurrentSubject
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Subject>()
      .cloned()
      .map(CurrentSubject)
      .ok_or(ApiError::Auth(AuthError::AuthenticationRequired))
  }
}

// ─── Authentication ───────────────────────────────────────────────────────────

pub async fn require_auth<S: Store>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let subject = state
    .credentials
    .authenticate(&state.store, req.headers())
    .await
    .inspect_err(|e| tracing::debug!(error = %e, "authentication failed"))?;
  req.extensions_mut().insert(subject);
  Ok(next.run(req).await)
}

// ─── Rate limiting ────────────────────────────────────────────────────────────

/// Count the request against the subject's window. Requests without a
/// subject pass through uncounted.
pub async fn rate_limited<S: Store>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response {
  let Some(subject) = req.extensions().get::<Subject>() else {
    return next.run(req).await;
  };

  let decision = state.limiter.try_acquire(subject).await;
  match decision {
    RateDecision::Allowed { limit, remaining } => {
      let mut res = next.run(req).await;
      set_rate_headers(res.headers_mut(), limit, remaining);
      res
    }
    RateDecision::Denied { limit, retry_after } => {
      let retry_after_secs = u64::try_from(retry_after.num_seconds()).unwrap_or(0).max(1);
      let mut res =
        ApiError::from(AuthError::RateLimitExceeded { retry_after_secs }).into_response();
      set_rate_headers(res.headers_mut(), limit, 0);
      res
    }
  }
}

fn set_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
  headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
  headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
}

// ─── Role ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct RoleGate {
  pub allowed: &'static [Role],
}

pub async fn require_role(
  State(gate): State<RoleGate>,
  req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  check_role(req.extensions().get::<Subject>(), gate.allowed)?;
  Ok(next.run(req).await)
}

// ─── Scope ────────────────────────────────────────────────────────────────────

/// Confine non-elevated subjects to their own faculty and department.
///
/// Requested values come from the query string and, for JSON requests, from
/// top-level body fields. The body is buffered and handed on unchanged.
pub async fn require_faculty_scope(req: Request, next: Next) -> Result<Response, ApiError> {
  let (parts, body) = req.into_parts();
  let subject = parts
    .extensions
    .get::<Subject>()
    .ok_or(AuthError::AuthenticationRequired)?;

  let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
  check_requested(subject, &|key| query.get(key).cloned())?;

  let body = if is_json(&parts.headers) {
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
      .await
      .map_err(|_| ApiError::PayloadTooLarge)?;
    if !bytes.is_empty() {
      let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;
      check_requested(subject, &|key| {
        value.get(key).and_then(|v| v.as_str()).map(str::to_owned)
      })?;
    }
    Body::from(bytes)
  } else {
    body
  };

  Ok(next.run(Request::from_parts(parts, body)).await)
}

fn check_requested(
  subject: &Subject,
  lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), AuthError> {
  let faculty = lookup("faculty_name").or_else(|| lookup("faculty"));
  check_faculty(subject, faculty.as_deref())?;
  check_department(subject, lookup("department").as_deref())
}

/// `application/json` or any `application/*+json`, in any case, with or
/// without parameters.
pub(crate) fn is_json(headers: &HeaderMap) -> bool {
  let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
    return false;
  };
  let essence = content_type.split(';').next().unwrap_or_default().trim();
  let Some((kind, subtype)) = essence.split_once('/') else {
    return false;
  };
  let subtype = subtype.to_ascii_lowercase();
  kind.eq_ignore_ascii_case("application") && (subtype == "json" || subtype.ends_with("+json"))
}

// ─── Ownership ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct OwnershipGate<S> {
  pub state: AppState<S>,
  pub kind:  ResourceKind,
}

/// Resolve the `{id}` path parameter as a resource of the gate's kind and
/// require the subject to have access to it.
pub async fn require_ownership<S: Store>(
  State(gate): State<OwnershipGate<S>>,
  Path(params): Path<HashMap<String, String>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let kind = gate.kind;
  let subject = req
    .extensions()
    .get::<Subject>()
    .ok_or(AuthError::AuthenticationRequired)?;

  // A malformed id cannot name an existing resource.
  let id = params
    .get("id")
    .and_then(|raw| Uuid::parse_str(raw).ok())
    .ok_or(AuthError::ResourceNotFound(kind))?;

  let resolved = ownership::resolve(gate.state.store.as_ref(), kind, id, subject).await?;
  if !resolved.has_access {
    tracing::warn!(subject = %subject.id, kind = %kind, resource_id = %id, "ownership denied");
    if gate.state.config.mask_denials {
      return Err(AuthError::ResourceNotFound(kind).into());
    }
  }
  let resource: Resource = resolved.into_granted()?;

  req.extensions_mut().insert(resource);
  Ok(next.run(req).await)
}
