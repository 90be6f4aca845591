//! Handlers for `/datasets` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/datasets` | Newest first |
//! | `POST`   | `/datasets` | Body: [`NewDataset`]; returns 201 |
//! | `GET`    | `/datasets/{id}` | 404 if not found |
//! | `PUT`    | `/datasets/{id}` | Body: `{"name":"...","description":"..."}` |
//! | `DELETE` | `/datasets/{id}` | Also removes links, scores and mappings; 204 |
//! | `POST`   | `/datasets/merge` | Body: [`MergeRequest`]; returns 201 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use epa_core::{
  import::{MergeRequest, MergeResult},
  model::{Dataset, NewDataset},
  store::PerformanceStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /datasets`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Dataset>>, ApiError>
where
  S: PerformanceStore,
{
  let datasets = store.list_datasets().await.map_err(ApiError::from_store)?;
  Ok(Json(datasets))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /datasets`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewDataset>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PerformanceStore,
{
  let dataset = store.create_dataset(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(dataset)))
}

// ─── Get / update / delete ────────────────────────────────────────────────────

/// `GET /datasets/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Dataset>, ApiError>
where
  S: PerformanceStore,
{
  let dataset = store.get_dataset(id).await.map_err(ApiError::from_store)?;
  Ok(Json(dataset))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

/// `PUT /datasets/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Dataset>, ApiError>
where
  S: PerformanceStore,
{
  let dataset = store
    .update_dataset(id, body.name, body.description)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(dataset))
}

/// `DELETE /datasets/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: PerformanceStore,
{
  store.delete_dataset(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Merge ────────────────────────────────────────────────────────────────────

/// `POST /datasets/merge`
pub async fn merge<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<MergeRequest>,
) -> Result<(StatusCode, Json<MergeResult>), ApiError>
where
  S: PerformanceStore,
{
  let merged = store.merge_datasets(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(merged)))
}
