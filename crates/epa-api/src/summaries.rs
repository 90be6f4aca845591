//! Handlers for cached employee summaries and generated drafts.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/employees/{id}/summary` | `null` when nothing is cached |
//! | `PUT`  | `/employees/{id}/summary` | Body: `{"content":"..."}` |
//! | `GET`  | `/datasets/{id}/employees/{employee_id}/summary/draft` | Not persisted |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use epa_core::{model::Summary, store::PerformanceStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `GET /employees/{id}/summary`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Option<Summary>>, ApiError>
where
  S: PerformanceStore,
{
  let summary = store.employee_summary(id).await.map_err(ApiError::from_store)?;
  Ok(Json(summary))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryBody {
  pub content: String,
}

/// `PUT /employees/{id}/summary`
pub async fn save<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<SummaryBody>,
) -> Result<Json<Summary>, ApiError>
where
  S: PerformanceStore,
{
  let summary = store
    .save_employee_summary(id, body.content)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(summary))
}

/// `GET /datasets/{id}/employees/{employee_id}/summary/draft`
pub async fn draft<S>(
  State(store): State<Arc<S>>,
  Path((id, employee_id)): Path<(i64, i64)>,
) -> Result<Json<SummaryBody>, ApiError>
where
  S: PerformanceStore,
{
  let content = store
    .generate_employee_summary(id, employee_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(SummaryBody { content }))
}
