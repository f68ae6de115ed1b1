//! Canonical roles and the normaliser that maps free-text spellings onto them.
//!
//! Role strings arrive from tokens, database rows and request bodies in
//! whatever casing and vocabulary the producer preferred ("Teacher", "PL",
//! "Principal Lecturer"). Everything downstream compares [`Role`] values only.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

// ─── Role ─────────────────────────────────────────────────────────────────────

/// One of the four roles used in every comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Lecturer,
  /// Principal / reviewing lead.
  Prl,
  ProgramLeader,
}

impl Role {
  pub const ALL: [Role; 4] =
    [Role::Student, Role::Lecturer, Role::Prl, Role::ProgramLeader];

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Student => "student",
      Role::Lecturer => "lecturer",
      Role::Prl => "prl",
      Role::ProgramLeader => "program_leader",
    }
  }

  /// Rank for scope purposes. Student and Lecturer share the bottom rank.
  pub fn seniority(&self) -> u8 {
    match self {
      Role::Student | Role::Lecturer => 0,
      Role::Prl => 1,
      Role::ProgramLeader => 2,
    }
  }

  /// PRL and Program Leader hold faculty-wide authority.
  pub fn is_elevated(&self) -> bool { self.seniority() >= Role::Prl.seniority() }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Normalised role ──────────────────────────────────────────────────────────

/// The output of [`normalize`]: either a canonical role or the raw input,
/// untouched, when no synonym matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedRole {
  Known(Role),
  Unknown(String),
}

impl NormalizedRole {
  pub fn as_str(&self) -> &str {
    match self {
      NormalizedRole::Known(r) => r.as_str(),
      NormalizedRole::Unknown(s) => s,
    }
  }

  pub fn known(&self) -> Option<Role> {
    match self {
      NormalizedRole::Known(r) => Some(*r),
      NormalizedRole::Unknown(_) => None,
    }
  }
}

impl fmt::Display for NormalizedRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for NormalizedRole {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

// ─── Normaliser ───────────────────────────────────────────────────────────────

const SYNONYMS: &[(&str, Role)] = &[
  ("student", Role::Student),
  ("st", Role::Student),
  ("learner", Role::Student),
  ("lecturer", Role::Lecturer),
  ("teacher", Role::Lecturer),
  ("lect", Role::Lecturer),
  ("instructor", Role::Lecturer),
  ("prl", Role::Prl),
  ("principal lecturer", Role::Prl),
  ("principal_lecturer", Role::Prl),
  ("principal-lecturer", Role::Prl),
  ("principal", Role::Prl),
  ("program_leader", Role::ProgramLeader),
  ("program leader", Role::ProgramLeader),
  ("program-leader", Role::ProgramLeader),
  ("programleader", Role::ProgramLeader),
  ("pl", Role::ProgramLeader),
  ("leader", Role::ProgramLeader),
];

/// Map a free-text role spelling to its canonical form.
///
/// Total and idempotent: `normalize(normalize(x).as_str())` equals
/// `normalize(x)`. `None`, empty and whitespace-only input yield `None`.
/// Unrecognised input is returned verbatim as [`NormalizedRole::Unknown`];
/// allow-list checks reject it later.
pub fn normalize(raw: Option<&str>) -> Option<NormalizedRole> {
  let raw = raw?;
  let key = raw.trim().to_lowercase();
  if key.is_empty() {
    return None;
  }

  let role = SYNONYMS
    .iter()
    .find(|(spelling, _)| *spelling == key)
    .map(|(_, role)| NormalizedRole::Known(*role))
    .unwrap_or_else(|| NormalizedRole::Unknown(raw.to_owned()));
  Some(role)
}
