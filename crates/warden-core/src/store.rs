//! Storage collaborators consumed by the engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `warden-store-sqlite`). Guards and the ownership resolver depend on these
//! abstractions, never on a concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  resource::{Assignment, Class, Course, Submission, UserProfile},
  subject::UserRecord,
};

// ─── Users ────────────────────────────────────────────────────────────────────

pub trait UserStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the live user row. Returns `None` if the user no longer exists.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + '_;

  /// Stamp the user's last-activity time. Callers treat this as best-effort.
  fn touch_last_activity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Resources ────────────────────────────────────────────────────────────────

/// One fetch-by-id per resource kind plus the two narrow joins the ownership
/// predicates need.
pub trait ResourceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_course(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  fn get_class(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Class>, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  fn get_user_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + '_;

  /// Faculty of the given course, or `None` if the course is missing or has
  /// no faculty.
  fn resolve_course_faculty(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// `true` iff an enrollment row with status `enrolled` exists.
  fn is_enrolled(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All courses in `faculty`.
  fn list_courses<'a>(
    &'a self,
    faculty: &'a str,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + 'a;
}

// ─── Activity log ─────────────────────────────────────────────────────────────

/// An audit entry waiting to be written. The store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewActivity {
  pub user_id:     Uuid,
  pub action_type: String,
  pub description: String,
  /// Origin address of the request, if known.
  pub origin:      Option<String>,
  /// Client identifier (user agent), if sent.
  pub client:      Option<String>,
  pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
  pub id:          Uuid,
  pub user_id:     Uuid,
  pub action_type: String,
  pub description: String,
  pub origin:      Option<String>,
  pub client:      Option<String>,
  pub recorded_at: DateTime<Utc>,
}

/// Append-only sink for the audit trail.
pub trait ActivityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn record_activity(
    &self,
    entry: NewActivity,
  ) -> impl Future<Output = Result<ActivityRecord, Self::Error>> + Send + '_;
}
