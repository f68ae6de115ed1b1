//! `GET /api/courses`: courses of one faculty.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use warden_core::{AuthError, resource::Course};

use crate::{AppState, Store, error::ApiError, guard::CurrentSubject};

#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
  pub faculty_name: Option<String>,
  pub faculty:      Option<String>,
}

/// Lists the requested faculty's courses, defaulting to the caller's own.
/// The scope guard has already rejected foreign faculties for non-elevated
/// callers.
pub async fn handler<S: Store>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<Course>>, ApiError> {
  let Some(faculty) = query
    .faculty_name
    .or(query.faculty)
    .or(subject.faculty_name)
  else {
    return Ok(Json(Vec::new()));
  };

  let courses = state
    .store
    .list_courses(&faculty)
    .await
    .map_err(AuthError::store)?;
  Ok(Json(courses))
}
