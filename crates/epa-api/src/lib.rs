//! JSON REST API for the employee performance store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`epa_core::store::PerformanceStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", epa_api::api_router(Arc::new(store)))
//! ```

pub mod analytics;
pub mod datasets;
pub mod employees;
pub mod error;
pub mod imports;
pub mod summaries;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use epa_core::store::PerformanceStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: PerformanceStore + 'static,
{
  Router::new()
    // Datasets
    .route("/datasets", get(datasets::list::<S>).post(datasets::create::<S>))
    .route("/datasets/merge", post(datasets::merge::<S>))
    .route("/datasets/compare", get(analytics::compare::<S>))
    .route(
      "/datasets/{id}",
      get(datasets::get_one::<S>)
        .put(datasets::update::<S>)
        .delete(datasets::delete_one::<S>),
    )
    .route("/datasets/{id}/stats", get(analytics::stats::<S>))
    .route(
      "/datasets/{id}/employees",
      get(employees::list_in_dataset::<S>).post(employees::append_to_dataset::<S>),
    )
    .route("/datasets/{id}/performance", post(imports::append_performance::<S>))
    .route(
      "/datasets/{id}/employees/{employee_id}/performance",
      get(employees::performance::<S>),
    )
    .route(
      "/datasets/{id}/employees/{employee_id}/summary/draft",
      get(summaries::draft::<S>),
    )
    // Employee master data
    .route("/employees", get(employees::list_all::<S>))
    .route("/employees/import", post(employees::import::<S>))
    .route("/employees/bulk-update", post(employees::bulk_update::<S>))
    .route("/employees/bulk-delete", post(employees::bulk_delete::<S>))
    .route(
      "/employees/{id}/summary",
      get(summaries::get_one::<S>).put(summaries::save::<S>),
    )
    // Imports
    .route("/imports/performance", post(imports::performance::<S>))
    .route("/imports/validate", post(imports::validate))
    .route("/imports/rating-defaults", get(imports::rating_defaults))
    // Analytics
    .route("/dashboard", get(analytics::dashboard::<S>))
    .with_state(store)
}
