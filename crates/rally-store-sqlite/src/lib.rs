//! SQLite backend for the Rally discovery store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The schema is versioned by
//! [`migrations`] and brought up to date whenever a store is opened.

mod encode;
mod store;

pub mod error;
pub mod migrations;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
