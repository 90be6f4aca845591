//! The `PerformanceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `epa-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Classify,
  analytics::{
    DashboardOverview, DatasetComparison, DatasetStats, EmployeeListing,
    EmployeePerformance,
  },
  import::{
    DatasetEmployeeAppendResult, EmployeeImportResult, MergeRequest,
    MergeResult, PerformanceAppend, PerformanceAppendResult,
    PerformanceImport, PerformanceImportResult,
  },
  model::{Dataset, Employee, EmployeeRow, EmployeeUpdate, NewDataset, Summary},
};

// ─── Query type ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeSortField {
  #[default]
  Name,
  Nip,
  Jabatan,
  Status,
  AverageScore,
  ScoreCount,
  CreatedAt,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

/// Parameters for [`PerformanceStore::list_employees`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeQuery {
  /// Case-insensitive substring over name, nip, jabatan and sub_jabatan.
  pub search:    Option<String>,
  pub limit:     Option<i64>,
  pub offset:    Option<i64>,
  pub sort_by:   Option<EmployeeSortField>,
  pub direction: Option<SortDirection>,
}

impl EmployeeQuery {
  /// Page size clamped to `1..=MAX_PAGE_SIZE`.
  pub fn limit(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as usize
  }

  pub fn offset(&self) -> usize { self.offset.unwrap_or(0).max(0) as usize }

  /// The trimmed, lower-cased search term, if any.
  pub fn needle(&self) -> Option<String> {
    self
      .search
      .as_deref()
      .map(|s| s.trim().to_lowercase())
      .filter(|s| !s.is_empty())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an employee performance store backend.
///
/// Orchestrated operations (imports, appends, merges) are atomic per
/// sub-step, not end to end: a failure may leave earlier sub-steps
/// committed.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PerformanceStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Datasets ──────────────────────────────────────────────────────────

  fn create_dataset(
    &self,
    input: NewDataset,
  ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send + '_;

  /// All datasets, newest first.
  fn list_datasets(
    &self,
  ) -> impl Future<Output = Result<Vec<Dataset>, Self::Error>> + Send + '_;

  fn get_dataset(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send + '_;

  /// Rename a dataset. The name is trimmed and must not be blank; a blank
  /// description clears it.
  fn update_dataset(
    &self,
    id: i64,
    name: String,
    description: Option<String>,
  ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send + '_;

  /// Delete a dataset together with its links, scores and rating mappings.
  fn delete_dataset(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Union two or more datasets into a newly created one.
  fn merge_datasets(
    &self,
    request: MergeRequest,
  ) -> impl Future<Output = Result<MergeResult, Self::Error>> + Send + '_;

  // ── Employee master data ──────────────────────────────────────────────

  /// Import or update employees, deduplicated by normalized name.
  fn import_employees(
    &self,
    rows: Vec<EmployeeRow>,
  ) -> impl Future<Output = Result<EmployeeImportResult, Self::Error>> + Send + '_;

  /// Import employees and link every one of them to `dataset_id`.
  fn append_dataset_employees(
    &self,
    dataset_id: i64,
    rows: Vec<EmployeeRow>,
  ) -> impl Future<Output = Result<DatasetEmployeeAppendResult, Self::Error>>
  + Send
  + '_;

  /// The whole master list, ordered case-insensitively by name.
  fn list_all_employees(
    &self,
  ) -> impl Future<Output = Result<Vec<Employee>, Self::Error>> + Send + '_;

  /// Apply partial updates; returns how many employees were changed.
  fn bulk_update_employees(
    &self,
    updates: Vec<EmployeeUpdate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete employees with their scores, links and summary; returns how
  /// many employees were removed.
  fn bulk_delete_employees(
    &self,
    ids: Vec<i64>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Performance ───────────────────────────────────────────────────────

  /// Create a dataset with its rating mappings, links and scores. Every
  /// referenced employee must already exist.
  fn import_performance_dataset(
    &self,
    input: PerformanceImport,
  ) -> impl Future<Output = Result<PerformanceImportResult, Self::Error>>
  + Send
  + '_;

  /// Add scores and rating mappings to an existing dataset.
  fn append_performance(
    &self,
    dataset_id: i64,
    input: PerformanceAppend,
  ) -> impl Future<Output = Result<PerformanceAppendResult, Self::Error>>
  + Send
  + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn list_employees<'a>(
    &'a self,
    dataset_id: i64,
    query: &'a EmployeeQuery,
  ) -> impl Future<Output = Result<EmployeeListing, Self::Error>> + Send + 'a;

  /// Fails with not-found unless the employee is linked to the dataset.
  fn employee_performance(
    &self,
    dataset_id: i64,
    employee_id: i64,
  ) -> impl Future<Output = Result<EmployeePerformance, Self::Error>> + Send + '_;

  fn dataset_stats(
    &self,
    dataset_id: i64,
  ) -> impl Future<Output = Result<DatasetStats, Self::Error>> + Send + '_;

  fn dashboard_overview(
    &self,
  ) -> impl Future<Output = Result<DashboardOverview, Self::Error>> + Send + '_;

  fn compare_datasets(
    &self,
    base_id: i64,
    comparison_id: i64,
  ) -> impl Future<Output = Result<DatasetComparison, Self::Error>> + Send + '_;

  // ── Summaries ─────────────────────────────────────────────────────────

  fn employee_summary(
    &self,
    employee_id: i64,
  ) -> impl Future<Output = Result<Option<Summary>, Self::Error>> + Send + '_;

  /// Insert or replace the cached narrative for an employee.
  fn save_employee_summary(
    &self,
    employee_id: i64,
    content: String,
  ) -> impl Future<Output = Result<Summary, Self::Error>> + Send + '_;

  /// Compose a narrative from the employee's performance in a dataset
  /// without persisting it.
  fn generate_employee_summary(
    &self,
    dataset_id: i64,
    employee_id: i64,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
