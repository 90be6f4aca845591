//! Core types and trait definitions for the employee performance store.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! identity, validation and aggregation engines here are pure functions; the
//! storage backends feed them rows and persist what they decide.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod error;
pub mod identity;
pub mod import;
pub mod model;
pub mod position;
pub mod store;
pub mod summary;
pub mod validation;

pub use error::{Classify, Entity, Error, ErrorKind, Result};
