//! Subject: the authenticated caller, rebuilt on every request.
//!
//! A subject is never persisted. It is assembled from verified token claims
//! merged with the live user row, and stops being valid the moment that row's
//! status leaves [`AccountStatus::Active`].

use std::fmt;

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::role::{NormalizedRole, Role, normalize};

// ─── Account status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
  Active,
  Inactive,
  Suspended,
  Disabled,
  /// Any status the store knows about that this crate does not.
  Other(String),
}

impl AccountStatus {
  pub fn parse(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "active" => Self::Active,
      "inactive" => Self::Inactive,
      "suspended" => Self::Suspended,
      "disabled" => Self::Disabled,
      other => Self::Other(other.to_owned()),
    }
  }

  /// Lower-case form, used both for storage and in error messages.
  pub fn as_str(&self) -> &str {
    match self {
      Self::Active => "active",
      Self::Inactive => "inactive",
      Self::Suspended => "suspended",
      Self::Disabled => "disabled",
      Self::Other(s) => s,
    }
  }

  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

impl fmt::Display for AccountStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for AccountStatus {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

// ─── Live user row ────────────────────────────────────────────────────────────

/// The user row as currently stored. `role` is the raw stored spelling.
#[derive(Debug, Clone)]
pub struct UserRecord {
  pub id:           Uuid,
  pub username:     String,
  pub email:        Option<String>,
  pub role:         Option<String>,
  pub faculty_name: Option<String>,
  pub department:   Option<String>,
  pub status:       AccountStatus,
}

// ─── Subject ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Subject {
  pub id:           Uuid,
  pub username:     String,
  pub email:        Option<String>,
  pub role:         Option<NormalizedRole>,
  pub faculty_name: Option<String>,
  pub department:   Option<String>,
  pub status:       AccountStatus,
}

impl Subject {
  /// Merge a token's role claim with the live row. The row wins for every
  /// field it supplies; the claimed role is used only when the row has none.
  pub fn from_live(claimed_role: Option<NormalizedRole>, row: UserRecord) -> Self {
    let role = normalize(row.role.as_deref()).or(claimed_role);
    Self {
      id: row.id,
      username: row.username,
      email: row.email,
      role,
      faculty_name: row.faculty_name,
      department: row.department,
      status: row.status,
    }
  }

  /// The canonical role, if the subject's role normalised to one.
  pub fn known_role(&self) -> Option<Role> {
    self.role.as_ref().and_then(NormalizedRole::known)
  }

  pub fn has_role(&self, role: Role) -> bool { self.known_role() == Some(role) }

  pub fn is_elevated(&self) -> bool {
    self.known_role().is_some_and(|r| r.is_elevated())
  }

  /// Role as shown in denial messages.
  pub fn role_label(&self) -> String {
    self
      .role
      .as_ref()
      .map_or_else(|| "none".to_owned(), |r| r.as_str().to_owned())
  }

  /// Faculty match used by elevated-role predicates: both sides present and
  /// equal.
  pub fn shares_faculty(&self, faculty: Option<&str>) -> bool {
    matches!((self.faculty_name.as_deref(), faculty), (Some(a), Some(b)) if a == b)
  }
}
