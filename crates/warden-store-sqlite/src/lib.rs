//! SQLite backend for Warden.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Implements the user, resource and
//! activity store traits from `warden-core`, plus the inserts needed to seed
//! a database.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
