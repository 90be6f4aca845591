//! SQLite backend for the employee performance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The schema is versioned through
//! `PRAGMA user_version` and upgraded in place when a store is opened.

mod encode;
mod import;
mod migrate;
mod repo;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use migrate::LATEST_VERSION;
pub use store::{SqliteStore, StoreManager, StoreOptions};

#[cfg(test)]
mod tests;
