//! [`SqliteStore`]: the SQLite implementation of the Warden store traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;
use warden_core::{
  resource::{Assignment, Class, Course, EnrollmentStatus, Submission, UserProfile},
  store::{ActivityRecord, ActivityStore, NewActivity, ResourceStore, UserStore},
  subject::{AccountStatus, UserRecord},
};

use crate::{
  Result,
  encode::{
    RawActivity, RawAssignment, RawClass, RawCourse, RawSubmission, RawUser,
    decode_dt, decode_enrollment, encode_dt, encode_enrollment, encode_uuid,
  },
  error::Error,
  schema::SCHEMA,
};

type RowMapper<R> = fn(&rusqlite::Row<'_>) -> rusqlite::Result<R>;

// ─── Store ────────────────────────────────────────────────────────────────────

/// A Warden store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-row `SELECT ... WHERE <key> = ?1` and map the row.
  async fn query_by_id<R>(&self, sql: String, id: Uuid, map: RowMapper<R>) -> Result<Option<R>>
  where
    R: Send + 'static,
  {
    let id_str = encode_uuid(id);
    let row = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![id_str], map).optional()?)
      })
      .await?;
    Ok(row)
  }

  async fn execute(&self, sql: &'static str, params: Vec<Option<String>>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params_from_iter(params))?))
      .await?;
    Ok(changed)
  }

  // ── Seeding ─────────────────────────────────────────────────────────────────

  pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
    self
      .execute(
        "INSERT INTO users (
           id, username, email, role, faculty_name, department, status, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        vec![
          Some(encode_uuid(user.id)),
          Some(user.username.clone()),
          user.email.clone(),
          user.role.clone(),
          user.faculty_name.clone(),
          user.department.clone(),
          Some(user.status.as_str().to_owned()),
          Some(encode_dt(Utc::now())),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_course(&self, course: &Course) -> Result<()> {
    self
      .execute(
        "INSERT INTO courses (id, code, name, faculty_name, lecturer_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        vec![
          Some(encode_uuid(course.id)),
          Some(course.code.clone()),
          Some(course.name.clone()),
          course.faculty_name.clone(),
          course.lecturer_id.map(encode_uuid),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_class(&self, class: &Class) -> Result<()> {
    self
      .execute(
        "INSERT INTO classes (id, course_id, lecturer_id, name, venue)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        vec![
          Some(encode_uuid(class.id)),
          Some(encode_uuid(class.course_id)),
          class.lecturer_id.map(encode_uuid),
          Some(class.name.clone()),
          class.venue.clone(),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
    self
      .execute(
        "INSERT INTO assignments (id, course_id, created_by, title, due_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        vec![
          Some(encode_uuid(assignment.id)),
          Some(encode_uuid(assignment.course_id)),
          assignment.created_by.map(encode_uuid),
          Some(assignment.title.clone()),
          assignment.due_at.map(encode_dt),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_submission(&self, submission: &Submission) -> Result<()> {
    let id_str            = encode_uuid(submission.id);
    let assignment_id_str = encode_uuid(submission.assignment_id);
    let student_id_str    = encode_uuid(submission.student_id);
    let submitted_at_str  = encode_dt(submission.submitted_at);
    let grade             = submission.grade;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO submissions (id, assignment_id, student_id, submitted_at, grade)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, assignment_id_str, student_id_str, submitted_at_str, grade],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Create or update the enrollment of `student_id` in `course_id`.
  pub async fn enroll(
    &self,
    student_id: Uuid,
    course_id: Uuid,
    status: EnrollmentStatus,
  ) -> Result<()> {
    self
      .execute(
        "INSERT INTO enrollments (student_id, course_id, status) VALUES (?1, ?2, ?3)
         ON CONFLICT (student_id, course_id) DO UPDATE SET status = excluded.status",
        vec![
          Some(encode_uuid(student_id)),
          Some(encode_uuid(course_id)),
          Some(encode_enrollment(status).to_owned()),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn enrollment(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> Result<Option<EnrollmentStatus>> {
    let student_str = encode_uuid(student_id);
    let course_str = encode_uuid(course_id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT status FROM enrollments WHERE student_id = ?1 AND course_id = ?2",
            rusqlite::params![student_str, course_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_enrollment).transpose()
  }

  /// Change a user's account status. Returns `false` if the user is unknown.
  pub async fn set_user_status(&self, id: Uuid, status: &AccountStatus) -> Result<bool> {
    let changed = self
      .execute(
        "UPDATE users SET status = ?2 WHERE id = ?1",
        vec![Some(encode_uuid(id)), Some(status.as_str().to_owned())],
      )
      .await?;
    Ok(changed > 0)
  }

  /// Change a user's stored role spelling. Returns `false` if the user is
  /// unknown.
  pub async fn set_user_role(&self, id: Uuid, role: Option<&str>) -> Result<bool> {
    let changed = self
      .execute(
        "UPDATE users SET role = ?2 WHERE id = ?1",
        vec![Some(encode_uuid(id)), role.map(str::to_owned)],
      )
      .await?;
    Ok(changed > 0)
  }

  /// Last time the user was seen by the credential validator.
  pub async fn last_activity(&self, id: Uuid) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<Option<String>> = self
      .query_by_id(
        "SELECT last_activity FROM users WHERE id = ?1".to_owned(),
        id,
        |row| row.get(0),
      )
      .await?;
    raw.flatten().as_deref().map(decode_dt).transpose()
  }

  /// The audit trail of one user, oldest first.
  pub async fn activity_for(&self, user_id: Uuid) -> Result<Vec<ActivityRecord>> {
    let user_str = encode_uuid(user_id);
    let sql = format!(
      "SELECT {} FROM activity_log WHERE user_id = ?1 ORDER BY recorded_at, rowid",
      RawActivity::COLUMNS
    );

    let raws: Vec<RawActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawActivity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawActivity::into_record).collect()
  }
}

// ─── UserStore impl ───────────────────────────────────────────────────────────

impl UserStore for SqliteStore {
  type Error = Error;

  async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", RawUser::COLUMNS);
    self
      .query_by_id(sql, id, RawUser::from_row)
      .await?
      .map(RawUser::into_record)
      .transpose()
  }

  async fn touch_last_activity(&self, id: Uuid) -> Result<()> {
    self
      .execute(
        "UPDATE users SET last_activity = ?2 WHERE id = ?1",
        vec![Some(encode_uuid(id)), Some(encode_dt(Utc::now()))],
      )
      .await?;
    Ok(())
  }
}

// ─── ResourceStore impl ───────────────────────────────────────────────────────

impl ResourceStore for SqliteStore {
  type Error = Error;

  async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?1", RawCourse::COLUMNS);
    self
      .query_by_id(sql, id, RawCourse::from_row)
      .await?
      .map(RawCourse::into_course)
      .transpose()
  }

  async fn get_class(&self, id: Uuid) -> Result<Option<Class>> {
    let sql = format!("SELECT {} FROM classes WHERE id = ?1", RawClass::COLUMNS);
    self
      .query_by_id(sql, id, RawClass::from_row)
      .await?
      .map(RawClass::into_class)
      .transpose()
  }

  async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let sql = format!("SELECT {} FROM assignments WHERE id = ?1", RawAssignment::COLUMNS);
    self
      .query_by_id(sql, id, RawAssignment::from_row)
      .await?
      .map(RawAssignment::into_assignment)
      .transpose()
  }

  async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
    let sql = format!("SELECT {} FROM submissions WHERE id = ?1", RawSubmission::COLUMNS);
    self
      .query_by_id(sql, id, RawSubmission::from_row)
      .await?
      .map(RawSubmission::into_submission)
      .transpose()
  }

  async fn get_user_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", RawUser::COLUMNS);
    self
      .query_by_id(sql, id, RawUser::from_row)
      .await?
      .map(RawUser::into_profile)
      .transpose()
  }

  async fn resolve_course_faculty(&self, course_id: Uuid) -> Result<Option<String>> {
    let faculty: Option<Option<String>> = self
      .query_by_id(
        "SELECT faculty_name FROM courses WHERE id = ?1".to_owned(),
        course_id,
        |row| row.get(0),
      )
      .await?;
    Ok(faculty.flatten())
  }

  async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool> {
    Ok(self.enrollment(student_id, course_id).await? == Some(EnrollmentStatus::Enrolled))
  }

  async fn list_courses<'a>(&'a self, faculty: &'a str) -> Result<Vec<Course>> {
    let faculty = faculty.to_owned();
    let sql = format!(
      "SELECT {} FROM courses WHERE faculty_name = ?1 ORDER BY code",
      RawCourse::COLUMNS
    );

    let raws: Vec<RawCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![faculty], RawCourse::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCourse::into_course).collect()
  }
}

// ─── ActivityStore impl ───────────────────────────────────────────────────────

impl ActivityStore for SqliteStore {
  type Error = Error;

  async fn record_activity(&self, entry: NewActivity) -> Result<ActivityRecord> {
    let record = ActivityRecord {
      id:          Uuid::new_v4(),
      user_id:     entry.user_id,
      action_type: entry.action_type,
      description: entry.description,
      origin:      entry.origin,
      client:      entry.client,
      recorded_at: entry.recorded_at,
    };

    self
      .execute(
        "INSERT INTO activity_log (
           id, user_id, action_type, description, origin, client, recorded_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        vec![
          Some(encode_uuid(record.id)),
          Some(encode_uuid(record.user_id)),
          Some(record.action_type.clone()),
          Some(record.description.clone()),
          record.origin.clone(),
          record.client.clone(),
          Some(encode_dt(record.recorded_at)),
        ],
      )
      .await?;

    tracing::trace!(user = %record.user_id, action = %record.action_type, "activity recorded");
    Ok(record)
  }
}
