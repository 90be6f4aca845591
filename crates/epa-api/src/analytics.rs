//! Read-only aggregate endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/datasets/{id}/stats` | |
//! | `GET`  | `/datasets/compare` | `?base=<id>&comparison=<id>`, both required |
//! | `GET`  | `/dashboard` | Across every dataset |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use epa_core::{
  analytics::{DashboardOverview, DatasetComparison, DatasetStats},
  store::PerformanceStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `GET /datasets/{id}/stats`
pub async fn stats<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<DatasetStats>, ApiError>
where
  S: PerformanceStore,
{
  let stats = store.dataset_stats(id).await.map_err(ApiError::from_store)?;
  Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
  pub base:       i64,
  pub comparison: i64,
}

/// `GET /datasets/compare?base=<id>&comparison=<id>`
pub async fn compare<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<CompareParams>,
) -> Result<Json<DatasetComparison>, ApiError>
where
  S: PerformanceStore,
{
  if params.base == params.comparison {
    return Err(ApiError::BadRequest(
      "choose two different datasets to compare".to_owned(),
    ));
  }
  let comparison = store
    .compare_datasets(params.base, params.comparison)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(comparison))
}

/// `GET /dashboard`
pub async fn dashboard<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<DashboardOverview>, ApiError>
where
  S: PerformanceStore,
{
  let overview = store.dashboard_overview().await.map_err(ApiError::from_store)?;
  Ok(Json(overview))
}
