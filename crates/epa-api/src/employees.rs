//! Handlers for employee master data and dataset rosters.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/employees` | Whole master list |
//! | `POST` | `/employees/import` | Body: array of employee rows |
//! | `POST` | `/employees/bulk-update` | Body: array of partial updates |
//! | `POST` | `/employees/bulk-delete` | Body: `{"ids":[...]}` |
//! | `GET`  | `/datasets/{id}/employees` | `?search&limit&offset&sort_by&direction` |
//! | `POST` | `/datasets/{id}/employees` | Body: array of employee rows |
//! | `GET`  | `/datasets/{id}/employees/{employee_id}/performance` | 404 unless linked |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use epa_core::{
  analytics::{EmployeeListing, EmployeePerformance},
  import::{DatasetEmployeeAppendResult, EmployeeImportResult},
  model::{Employee, EmployeeRow, EmployeeUpdate},
  store::{EmployeeQuery, PerformanceStore},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Master list ──────────────────────────────────────────────────────────────

/// `GET /employees`
pub async fn list_all<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Employee>>, ApiError>
where
  S: PerformanceStore,
{
  let employees = store.list_all_employees().await.map_err(ApiError::from_store)?;
  Ok(Json(employees))
}

/// `POST /employees/import`
pub async fn import<S>(
  State(store): State<Arc<S>>,
  Json(rows): Json<Vec<EmployeeRow>>,
) -> Result<Json<EmployeeImportResult>, ApiError>
where
  S: PerformanceStore,
{
  let result = store.import_employees(rows).await.map_err(ApiError::from_store)?;
  Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct BulkUpdated {
  pub updated: usize,
}

/// `POST /employees/bulk-update`
pub async fn bulk_update<S>(
  State(store): State<Arc<S>>,
  Json(updates): Json<Vec<EmployeeUpdate>>,
) -> Result<Json<BulkUpdated>, ApiError>
where
  S: PerformanceStore,
{
  let updated = store
    .bulk_update_employees(updates)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(BulkUpdated { updated }))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
  pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleted {
  pub deleted: usize,
}

/// `POST /employees/bulk-delete`
pub async fn bulk_delete<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<BulkDeleteBody>,
) -> Result<Json<BulkDeleted>, ApiError>
where
  S: PerformanceStore,
{
  let deleted = store
    .bulk_delete_employees(body.ids)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(BulkDeleted { deleted }))
}

// ─── Dataset roster ───────────────────────────────────────────────────────────

/// `GET /datasets/{id}/employees`
pub async fn list_in_dataset<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Query(query): Query<EmployeeQuery>,
) -> Result<Json<EmployeeListing>, ApiError>
where
  S: PerformanceStore,
{
  let listing = store
    .list_employees(id, &query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(listing))
}

/// `POST /datasets/{id}/employees`
pub async fn append_to_dataset<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(rows): Json<Vec<EmployeeRow>>,
) -> Result<Json<DatasetEmployeeAppendResult>, ApiError>
where
  S: PerformanceStore,
{
  let result = store
    .append_dataset_employees(id, rows)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(result))
}

/// `GET /datasets/{id}/employees/{employee_id}/performance`
pub async fn performance<S>(
  State(store): State<Arc<S>>,
  Path((id, employee_id)): Path<(i64, i64)>,
) -> Result<Json<EmployeePerformance>, ApiError>
where
  S: PerformanceStore,
{
  let performance = store
    .employee_performance(id, employee_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(performance))
}
