//! Per-subject sliding-window rate limiting.
//!
//! Each subject owns a list of request timestamps. On every check the list is
//! pruned to the active window, the request is denied if the list already
//! holds `max` entries, and otherwise the current time is appended.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::{role::Role, subject::Subject};

// ─── Limits ───────────────────────────────────────────────────────────────────

/// Role-tiered caps sharing one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
  pub window:         TimeDelta,
  pub student:        u32,
  pub lecturer:       u32,
  pub prl:            u32,
  pub program_leader: u32,
}

impl Default for RateLimits {
  fn default() -> Self {
    Self {
      window:         TimeDelta::minutes(15),
      student:        100,
      lecturer:       200,
      prl:            300,
      program_leader: 500,
    }
  }
}

impl RateLimits {
  /// Cap for a role. Unknown or missing roles get the student tier.
  pub fn max_for(&self, role: Option<Role>) -> u32 {
    match role {
      Some(Role::ProgramLeader) => self.program_leader,
      Some(Role::Prl) => self.prl,
      Some(Role::Lecturer) => self.lecturer,
      Some(Role::Student) | None => self.student,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
  Allowed { limit: u32, remaining: u32 },
  Denied { limit: u32, retry_after: TimeDelta },
}

impl RateDecision {
  pub fn is_allowed(&self) -> bool { matches!(self, Self::Allowed { .. }) }

  pub fn limit(&self) -> u32 {
    match self {
      Self::Allowed { limit, .. } | Self::Denied { limit, .. } => *limit,
    }
  }
}

// ─── Storage ──────────────────────────────────────────────────────────────────

/// Backing store for request windows. A check-and-append must be atomic per
/// key.
#[async_trait]
pub trait RateStore: Send + Sync {
  /// Prune `key`'s window, then record a request at `now` unless `max` is
  /// already reached.
  async fn hit(&self, key: Uuid, now: DateTime<Utc>, window: TimeDelta, max: u32) -> RateDecision;

  /// Drop timestamps older than `cutoff` and forget keys left empty.
  /// Returns the number of keys removed.
  async fn sweep(&self, cutoff: DateTime<Utc>) -> usize;
}

/// Single-process store. The entry guard holds the shard lock for the whole
/// check, so concurrent hits on one key are serialised.
#[derive(Debug, Default)]
pub struct InMemoryRateStore {
  windows: DashMap<Uuid, Vec<DateTime<Utc>>>,
}

impl InMemoryRateStore {
  pub fn new() -> Self { Self::default() }

  /// Number of subjects currently tracked.
  pub fn tracked(&self) -> usize { self.windows.len() }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
  async fn hit(&self, key: Uuid, now: DateTime<Utc>, window: TimeDelta, max: u32) -> RateDecision {
    let cutoff = window_start(now, window);
    let mut entry = self.windows.entry(key).or_default();
    let stamps = entry.value_mut();
    stamps.retain(|t| *t >= cutoff);

    let count = u32::try_from(stamps.len()).unwrap_or(u32::MAX);
    if count >= max {
      let oldest = stamps.iter().min().copied().unwrap_or(now);
      return RateDecision::Denied {
        limit:       max,
        retry_after: oldest.checked_add_signed(window).map_or(TimeDelta::MAX, |t| t - now),
      };
    }

    stamps.push(now);
    RateDecision::Allowed {
      limit:     max,
      remaining: max - count - 1,
    }
  }

  async fn sweep(&self, cutoff: DateTime<Utc>) -> usize {
    let before = self.windows.len();
    self.windows.retain(|_, stamps| {
      stamps.retain(|t| *t >= cutoff);
      !stamps.is_empty()
    });
    before.saturating_sub(self.windows.len())
  }
}

/// Oldest instant still inside a window ending at `now`. Windows reaching
/// past the representable range start at its minimum.
fn window_start(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
  now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ─── Limiter ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RateLimiter {
  store:  Arc<dyn RateStore>,
  limits: RateLimits,
}

impl RateLimiter {
  pub fn new(limits: RateLimits) -> Self {
    Self { store: Arc::new(InMemoryRateStore::new()), limits }
  }

  pub fn with_store(mut self, store: Arc<dyn RateStore>) -> Self {
    self.store = store;
    self
  }

  pub fn limits(&self) -> &RateLimits { &self.limits }

  pub async fn try_acquire(&self, subject: &Subject) -> RateDecision {
    self
      .try_acquire_at(subject.id, subject.known_role(), Utc::now())
      .await
  }

  pub async fn try_acquire_at(
    &self,
    key: Uuid,
    role: Option<Role>,
    now: DateTime<Utc>,
  ) -> RateDecision {
    let max = self.limits.max_for(role);
    let decision = self.store.hit(key, now, self.limits.window, max).await;
    if !decision.is_allowed() {
      tracing::warn!(subject = %key, limit = max, "rate limit exceeded");
    }
    decision
  }

  /// Forget subjects with no requests left in the window ending at `now`.
  pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
    let removed = self.store.sweep(window_start(now, self.limits.window)).await;
    if removed > 0 {
      tracing::debug!(removed, "swept idle rate windows");
    }
    removed
  }
}
