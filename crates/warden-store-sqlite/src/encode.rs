//! Conversions between domain types and the plain-text columns SQLite stores.
//!
//! Timestamps are RFC 3339 strings and UUIDs are hyphenated lowercase
//! strings. Row structs hold the raw column values read inside a
//! `Connection::call` closure; decoding happens afterwards, on the async side.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;
use warden_core::{
  resource::{Assignment, Class, Course, EnrollmentStatus, Submission, UserProfile},
  store::ActivityRecord,
  subject::{AccountStatus, UserRecord},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so text order matches time order.
pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EnrollmentStatus ─────────────────────────────────────────────────────────

pub fn encode_enrollment(status: EnrollmentStatus) -> &'static str {
  match status {
    EnrollmentStatus::Enrolled => "enrolled",
    EnrollmentStatus::Dropped => "dropped",
    EnrollmentStatus::Completed => "completed",
  }
}

pub fn decode_enrollment(s: &str) -> Result<EnrollmentStatus> {
  match s {
    "enrolled" => Ok(EnrollmentStatus::Enrolled),
    "dropped" => Ok(EnrollmentStatus::Dropped),
    "completed" => Ok(EnrollmentStatus::Completed),
    other => Err(Error::EnrollmentStatus(other.to_owned())),
  }
}

// ─── Row types ────────────────────────────────────────────────────────────────

pub struct RawUser {
  pub id:           String,
  pub username:     String,
  pub email:        Option<String>,
  pub role:         Option<String>,
  pub faculty_name: Option<String>,
  pub department:   Option<String>,
  pub status:       String,
}

impl RawUser {
  pub const COLUMNS: &'static str = "id, username, email, role, faculty_name, department, status";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      username:     row.get(1)?,
      email:        row.get(2)?,
      role:         row.get(3)?,
      faculty_name: row.get(4)?,
      department:   row.get(5)?,
      status:       row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<UserRecord> {
    Ok(UserRecord {
      id:           decode_uuid(&self.id)?,
      username:     self.username,
      email:        self.email,
      role:         self.role,
      faculty_name: self.faculty_name,
      department:   self.department,
      status:       AccountStatus::parse(&self.status),
    })
  }

  pub fn into_profile(self) -> Result<UserProfile> {
    Ok(UserProfile {
      id:           decode_uuid(&self.id)?,
      username:     self.username,
      email:        self.email,
      role:         self.role,
      faculty_name: self.faculty_name,
      department:   self.department,
    })
  }
}

pub struct RawCourse {
  pub id:           String,
  pub code:         String,
  pub name:         String,
  pub faculty_name: Option<String>,
  pub lecturer_id:  Option<String>,
}

impl RawCourse {
  pub const COLUMNS: &'static str = "id, code, name, faculty_name, lecturer_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      code:         row.get(1)?,
      name:         row.get(2)?,
      faculty_name: row.get(3)?,
      lecturer_id:  row.get(4)?,
    })
  }

  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      id:           decode_uuid(&self.id)?,
      code:         self.code,
      name:         self.name,
      faculty_name: self.faculty_name,
      lecturer_id:  decode_opt_uuid(self.lecturer_id)?,
    })
  }
}

pub struct RawClass {
  pub id:          String,
  pub course_id:   String,
  pub lecturer_id: Option<String>,
  pub name:        String,
  pub venue:       Option<String>,
}

impl RawClass {
  pub const COLUMNS: &'static str = "id, course_id, lecturer_id, name, venue";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      course_id:   row.get(1)?,
      lecturer_id: row.get(2)?,
      name:        row.get(3)?,
      venue:       row.get(4)?,
    })
  }

  pub fn into_class(self) -> Result<Class> {
    Ok(Class {
      id:          decode_uuid(&self.id)?,
      course_id:   decode_uuid(&self.course_id)?,
      lecturer_id: decode_opt_uuid(self.lecturer_id)?,
      name:        self.name,
      venue:       self.venue,
    })
  }
}

pub struct RawAssignment {
  pub id:         String,
  pub course_id:  String,
  pub created_by: Option<String>,
  pub title:      String,
  pub due_at:     Option<String>,
}

impl RawAssignment {
  pub const COLUMNS: &'static str = "id, course_id, created_by, title, due_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      course_id:  row.get(1)?,
      created_by: row.get(2)?,
      title:      row.get(3)?,
      due_at:     row.get(4)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      id:         decode_uuid(&self.id)?,
      course_id:  decode_uuid(&self.course_id)?,
      created_by: decode_opt_uuid(self.created_by)?,
      title:      self.title,
      due_at:     self.due_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawSubmission {
  pub id:            String,
  pub assignment_id: String,
  pub student_id:    String,
  pub submitted_at:  String,
  pub grade:         Option<f64>,
}

impl RawSubmission {
  pub const COLUMNS: &'static str = "id, assignment_id, student_id, submitted_at, grade";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      assignment_id: row.get(1)?,
      student_id:    row.get(2)?,
      submitted_at:  row.get(3)?,
      grade:         row.get(4)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      id:            decode_uuid(&self.id)?,
      assignment_id: decode_uuid(&self.assignment_id)?,
      student_id:    decode_uuid(&self.student_id)?,
      submitted_at:  decode_dt(&self.submitted_at)?,
      grade:         self.grade,
    })
  }
}

pub struct RawActivity {
  pub id:          String,
  pub user_id:     String,
  pub action_type: String,
  pub description: String,
  pub origin:      Option<String>,
  pub client:      Option<String>,
  pub recorded_at: String,
}

impl RawActivity {
  pub const COLUMNS: &'static str = "id, user_id, action_type, description, origin, client, recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      user_id:     row.get(1)?,
      action_type: row.get(2)?,
      description: row.get(3)?,
      origin:      row.get(4)?,
      client:      row.get(5)?,
      recorded_at: row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<ActivityRecord> {
    Ok(ActivityRecord {
      id:          decode_uuid(&self.id)?,
      user_id:     decode_uuid(&self.user_id)?,
      action_type: self.action_type,
      description: self.description,
      origin:      self.origin,
      client:      self.client,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
