//! The five resource kinds an ownership check can target.
//!
//! Only the fields that take part in access decisions (owner keys, parent
//! foreign keys, faculty) plus a handful of descriptive columns are modelled.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminant used to pick a fetcher and a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Course,
  Class,
  Assignment,
  Submission,
  User,
}

impl ResourceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Course => "course",
      Self::Class => "class",
      Self::Assignment => "assignment",
      Self::Submission => "submission",
      Self::User => "user",
    }
  }

  /// Capitalised form for messages such as "Course not found".
  pub fn label(&self) -> &'static str {
    match self {
      Self::Course => "Course",
      Self::Class => "Class",
      Self::Assignment => "Assignment",
      Self::Submission => "Submission",
      Self::User => "User",
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
  pub id:           Uuid,
  pub code:         String,
  pub name:         String,
  pub faculty_name: Option<String>,
  pub lecturer_id:  Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
  pub id:          Uuid,
  pub course_id:   Uuid,
  pub lecturer_id: Option<Uuid>,
  pub name:        String,
  pub venue:       Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
  pub id:         Uuid,
  pub course_id:  Uuid,
  pub created_by: Option<Uuid>,
  pub title:      String,
  pub due_at:     Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
  pub id:            Uuid,
  pub assignment_id: Uuid,
  pub student_id:    Uuid,
  pub submitted_at:  DateTime<Utc>,
  pub grade:         Option<f64>,
}

/// Public profile view of a user row; carries no account status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id:           Uuid,
  pub username:     String,
  pub email:        Option<String>,
  pub role:         Option<String>,
  pub faculty_name: Option<String>,
  pub department:   Option<String>,
}

/// A fetched resource of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resource {
  Course(Course),
  Class(Class),
  Assignment(Assignment),
  Submission(Submission),
  User(UserProfile),
}

impl Resource {
  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::Course(_) => ResourceKind::Course,
      Self::Class(_) => ResourceKind::Class,
      Self::Assignment(_) => ResourceKind::Assignment,
      Self::Submission(_) => ResourceKind::Submission,
      Self::User(_) => ResourceKind::User,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Course(c) => c.id,
      Self::Class(c) => c.id,
      Self::Assignment(a) => a.id,
      Self::Submission(s) => s.id,
      Self::User(u) => u.id,
    }
  }
}

// ─── Enrollment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
  Enrolled,
  Dropped,
  Completed,
}
