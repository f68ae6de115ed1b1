pub mod courses;
pub mod me;
pub mod resource;

use axum::Json;
use serde_json::{Value, json};

/// Liveness probe; public.
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
