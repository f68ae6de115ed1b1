//! Core types and decision logic for the Warden authorization engine.
//!
//! This crate has no HTTP and database dependencies. It
//! knows how to normalise role names, compare roles and scopes, decide
//! ownership of the five resource kinds, and count requests in a sliding
//! window. Storage is reached only through the traits in [`store`].

// Store traits spell out `Send` futures where it matters.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod guard;
pub mod ownership;
pub mod ratelimit;
pub mod resource;
pub mod role;
pub mod store;
pub mod subject;

pub use error::{AuthError, Result};
pub use role::{NormalizedRole, Role, normalize};
pub use subject::{AccountStatus, Subject, UserRecord};
