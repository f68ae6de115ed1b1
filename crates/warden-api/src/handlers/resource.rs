//! Shared handler for the single-resource routes.
//!
//! The ownership guard has already fetched the resource and checked access,
//! so the handler only renders what it left in the extensions.

use axum::{Extension, Json};
use warden_core::resource::Resource;

pub async fn handler(Extension(resource): Extension<Resource>) -> Json<Resource> {
  Json(resource)
}
