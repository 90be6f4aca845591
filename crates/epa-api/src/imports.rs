//! Handlers for performance imports and pre-import validation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/imports/performance` | Body: [`PerformanceImport`]; returns 201 |
//! | `POST` | `/datasets/{id}/performance` | Body: [`PerformanceAppend`] |
//! | `POST` | `/imports/validate` | Body: [`ImportPayload`]; never touches the store |
//! | `GET`  | `/imports/rating-defaults` | The suggested rating mappings |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use epa_core::{
  import::{
    PerformanceAppend, PerformanceAppendResult, PerformanceImport,
    PerformanceImportResult, default_rating_mappings,
  },
  model::RatingRow,
  store::PerformanceStore,
  validation::{ImportPayload, ValidationReport, validate_import},
};

use crate::error::ApiError;

/// `POST /imports/performance`
pub async fn performance<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<PerformanceImport>,
) -> Result<(StatusCode, Json<PerformanceImportResult>), ApiError>
where
  S: PerformanceStore,
{
  let result = store
    .import_performance_dataset(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(result)))
}

/// `POST /datasets/{id}/performance`
pub async fn append_performance<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<PerformanceAppend>,
) -> Result<Json<PerformanceAppendResult>, ApiError>
where
  S: PerformanceStore,
{
  let result = store
    .append_performance(id, body)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(result))
}

/// `POST /imports/validate`
pub async fn validate(Json(payload): Json<ImportPayload>) -> Json<ValidationReport> {
  Json(validate_import(&payload))
}

/// `GET /imports/rating-defaults`
pub async fn rating_defaults() -> Json<Vec<RatingRow>> { Json(default_rating_mappings()) }
