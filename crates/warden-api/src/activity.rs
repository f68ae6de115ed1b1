//! Outcome-gated audit trail.
//!
//! [`with_activity_log`] wraps a handler. When the handler answers with a 2xx
//! status, a pending entry goes onto a bounded channel; a worker task turns
//! it into a description and writes it through [`ActivityStore`]. Nothing on
//! this path can change or delay the response.
//!
//! Describers see the resource the ownership guard attached and, for JSON
//! responses up to [`CAPTURE_LIMIT`] bytes, the parsed response body.

use std::{
  net::SocketAddr,
  panic::{AssertUnwindSafe, catch_unwind},
  sync::Arc,
};

use axum::{
  body::{Body, HttpBody},
  extract::{ConnectInfo, Request, State},
  http::{HeaderMap, StatusCode, header},
  middleware::Next,
  response::Response,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::{
  sync::mpsc::{self, error::TrySendError},
  task::JoinHandle,
};
use warden_core::{
  Subject,
  resource::Resource,
  store::{ActivityStore, NewActivity},
};

use crate::guard::is_json;

/// Largest response body handed to describers.
pub const CAPTURE_LIMIT: usize = 64 * 1024;

/// Produces the free-text description of an entry.
pub type Describer = Arc<dyn Fn(&ActivityContext) -> anyhow::Result<String> + Send + Sync>;

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
  pub origin: Option<String>,
  pub client: Option<String>,
}

impl RequestMeta {
  /// Origin is the first `x-forwarded-for` hop, else the peer address.
  pub fn from_request(req: &Request) -> Self {
    let peer = req
      .extensions()
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| addr.ip().to_string());
    Self::from_headers(req.headers(), peer)
  }

  fn from_headers(headers: &HeaderMap, peer: Option<String>) -> Self {
    let forwarded = headers
      .get("x-forwarded-for")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(',').next())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned);
    let client = headers
      .get(header::USER_AGENT)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    Self { origin: forwarded.or(peer), client }
  }
}

/// Everything a describer may look at.
#[derive(Debug, Clone)]
pub struct ActivityContext {
  pub subject:  Subject,
  pub action:   &'static str,
  pub resource: Option<Resource>,
  pub meta:     RequestMeta,
  pub status:   StatusCode,
  /// The JSON response body, when it was small enough to capture.
  pub response: Option<Value>,
}

struct Pending {
  context:     ActivityContext,
  describe:    Describer,
  recorded_at: DateTime<Utc>,
}

// ─── Recorder ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ActivityRecorder {
  tx: mpsc::Sender<Pending>,
}

impl ActivityRecorder {
  /// Start the worker. It runs until every recorder clone is dropped and the
  /// queue has drained.
  pub fn spawn<S>(store: Arc<S>, capacity: usize) -> (Self, JoinHandle<()>)
  where
    S: ActivityStore + 'static,
  {
    let (tx, mut rx) = mpsc::channel::<Pending>(capacity.max(1));
    let worker = tokio::spawn(async move {
      while let Some(pending) = rx.recv().await {
        persist(store.as_ref(), pending).await;
      }
      tracing::debug!("activity worker stopped");
    });
    (Self { tx }, worker)
  }

  fn enqueue(&self, pending: Pending) {
    match self.tx.try_send(pending) {
      Ok(()) => {}
      Err(TrySendError::Full(p)) => {
        tracing::warn!(user = %p.context.subject.id, action = p.context.action, "activity queue full, entry dropped");
      }
      Err(TrySendError::Closed(p)) => {
        tracing::warn!(user = %p.context.subject.id, action = p.context.action, "activity worker gone, entry dropped");
      }
    }
  }
}

async fn persist<S: ActivityStore>(store: &S, pending: Pending) {
  let Pending { context, describe, recorded_at } = pending;
  let description = match catch_unwind(AssertUnwindSafe(|| describe(&context))) {
    Ok(Ok(d)) => d,
    Ok(Err(e)) => {
      tracing::warn!(user = %context.subject.id, action = context.action, error = %e, "activity description failed");
      return;
    }
    Err(_) => {
      tracing::warn!(user = %context.subject.id, action = context.action, "activity describer panicked");
      return;
    }
  };

  let entry = NewActivity {
    user_id: context.subject.id,
    action_type: context.action.to_owned(),
    description,
    origin: context.meta.origin,
    client: context.meta.client,
    recorded_at,
  };
  if let Err(e) = store.record_activity(entry).await {
    tracing::warn!(user = %context.subject.id, action = context.action, error = %e, "failed to record activity");
  }
}

// ─── Middleware ───────────────────────────────────────────────────────────────

/// Per-route configuration for [`with_activity_log`].
#[derive(Clone)]
pub struct ActivityGate {
  recorder: ActivityRecorder,
  action:   &'static str,
  describe: Describer,
}

impl ActivityGate {
  pub fn new(recorder: ActivityRecorder, action: &'static str, describe: Describer) -> Self {
    Self { recorder, action, describe }
  }
}

pub async fn with_activity_log(
  State(gate): State<ActivityGate>,
  req: Request,
  next: Next,
) -> Response {
  let subject = req.extensions().get::<Subject>().cloned();
  let resource = req.extensions().get::<Resource>().cloned();
  let meta = RequestMeta::from_request(&req);

  let response = next.run(req).await;

  if !response.status().is_success() {
    return response;
  }
  let Some(subject) = subject else {
    return response;
  };

  let status = response.status();
  let (response, captured) = capture_json(response).await;
  gate.recorder.enqueue(Pending {
    context:     ActivityContext {
      subject,
      action: gate.action,
      resource,
      meta,
      status,
      response: captured,
    },
    describe:    Arc::clone(&gate.describe),
    recorded_at: Utc::now(),
  });
  response
}

/// Buffer and parse a JSON body whose size is known to fit
/// [`CAPTURE_LIMIT`], handing the same bytes back in the response.
async fn capture_json(response: Response) -> (Response, Option<Value>) {
  let fits = response
    .body()
    .size_hint()
    .upper()
    .is_some_and(|n| n <= CAPTURE_LIMIT as u64);
  if !fits || !is_json(response.headers()) {
    return (response, None);
  }

  let (parts, body) = response.into_parts();
  match axum::body::to_bytes(body, CAPTURE_LIMIT).await {
    Ok(bytes) => {
      let value = serde_json::from_slice(&bytes).ok();
      (Response::from_parts(parts, Body::from(bytes)), value)
    }
    Err(e) => {
      tracing::warn!(error = %e, "failed to buffer response for activity log");
      (Response::from_parts(parts, Body::empty()), None)
    }
  }
}

// ─── Describers ───────────────────────────────────────────────────────────────

pub fn describe_class_view(ctx: &ActivityContext) -> anyhow::Result<String> {
  match &ctx.resource {
    Some(Resource::Class(class)) => Ok(format!("Viewed class {} ({})", class.name, class.id)),
    _ => anyhow::bail!("class view logged without a class attached"),
  }
}

pub fn describe_submission_view(ctx: &ActivityContext) -> anyhow::Result<String> {
  match &ctx.resource {
    Some(Resource::Submission(s)) => Ok(format!(
      "Viewed submission {} for assignment {}",
      s.id, s.assignment_id
    )),
    _ => anyhow::bail!("submission view logged without a submission attached"),
  }
}
