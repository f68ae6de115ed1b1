//! Role and scope guards.
//!
//! Both are pure checks over an already-authenticated [`Subject`]; they never
//! touch storage.

use crate::{AuthError, Result, role::Role, subject::Subject};

// ─── Role guard ───────────────────────────────────────────────────────────────

/// Allow only subjects whose canonical role is in `allowed`.
///
/// An unrecognised or missing role never matches.
pub fn check_role(subject: Option<&Subject>, allowed: &[Role]) -> Result<()> {
  let subject = subject.ok_or(AuthError::AuthenticationRequired)?;
  match subject.known_role() {
    Some(role) if allowed.contains(&role) => Ok(()),
    _ => Err(AuthError::InsufficientRole {
      allowed: allowed.to_vec(),
      actual:  subject.role_label(),
    }),
  }
}

// ─── Scope guard ──────────────────────────────────────────────────────────────

/// Deny a non-elevated subject asking for another faculty's data.
///
/// Absence of a requested faculty is not a denial.
pub fn check_faculty(subject: &Subject, requested: Option<&str>) -> Result<()> {
  check_scope(
    subject,
    subject.faculty_name.as_deref(),
    requested,
    AuthError::CrossFacultyAccessDenied,
  )
}

/// Deny a non-elevated subject asking for another department's data.
pub fn check_department(subject: &Subject, requested: Option<&str>) -> Result<()> {
  check_scope(
    subject,
    subject.department.as_deref(),
    requested,
    AuthError::CrossDepartmentAccessDenied,
  )
}

fn check_scope(
  subject: &Subject,
  own: Option<&str>,
  requested: Option<&str>,
  denial: AuthError,
) -> Result<()> {
  if subject.is_elevated() {
    return Ok(());
  }
  match requested {
    Some(wanted) if Some(wanted) != own => {
      tracing::debug!(subject = %subject.id, requested = wanted, "scope denied");
      Err(denial)
    }
    _ => Ok(()),
  }
}
