//! `GET /api/me`: the caller as the server currently sees them.

use axum::Json;
use warden_core::Subject;

use crate::guard::CurrentSubject;

pub async fn handler(CurrentSubject(subject): CurrentSubject) -> Json<Subject> { Json(subject) }
