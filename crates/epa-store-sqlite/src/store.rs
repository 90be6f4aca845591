//! [`SqliteStore`], the SQLite implementation of [`PerformanceStore`], and
//! [`StoreManager`], which owns its open/close lifecycle.

use std::path::{Path, PathBuf};

use chrono::Utc;
use epa_core::{
  Entity, Error as CoreError,
  analytics::{
    self, DashboardOverview, DatasetComparison, DatasetStats, EmployeeListing,
    EmployeePerformance,
  },
  import::{
    DatasetEmployeeAppendResult, EmployeeImportResult, MergeRequest,
    MergeResult, PerformanceAppend, PerformanceAppendResult,
    PerformanceImport, PerformanceImportResult,
  },
  model::{Dataset, Employee, EmployeeRow, EmployeeUpdate, NewDataset, Summary},
  store::{EmployeeQuery, PerformanceStore},
  summary,
};
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::Mutex;
use tracing::info;

use crate::{Result, import, migrate, repo};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
  /// Schema version to upgrade to when opening.
  pub target_version: u32,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { target_version: migrate::LATEST_VERSION } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An employee performance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, upgrading it to the latest schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, StoreOptions::default()).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let store = Self { conn };
    let target = options.target_version;
    let version = store
      .with_conn(move |conn| {
        // Set outside the upgrade transaction; table rebuilds need it off.
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = OFF;")?;
        let version = migrate::upgrade(conn, target)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(version)
      })
      .await?;
    info!(version, "performance store ready");
    Ok(store)
  }

  /// The schema version persisted in the file.
  pub async fn schema_version(&self) -> Result<u32> {
    self.with_conn(|conn| migrate::user_version(conn)).await
  }

  /// Close the underlying connection. Other clones of this handle fail
  /// afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  /// Run `f` on the database thread.
  pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Owns the lifecycle of one store file.
///
/// [`StoreManager::open`] is idempotent: the first call opens and upgrades
/// the file, concurrent and later calls wait for it and share the handle.
pub struct StoreManager {
  path:    PathBuf,
  options: StoreOptions,
  slot:    Mutex<Option<SqliteStore>>,
}

impl StoreManager {
  pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
    Self { path: path.into(), options, slot: Mutex::new(None) }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub async fn open(&self) -> Result<SqliteStore> {
    let mut slot = self.slot.lock().await;
    if let Some(store) = slot.as_ref() {
      return Ok(store.clone());
    }
    let store = SqliteStore::open_with(&self.path, self.options).await?;
    *slot = Some(store.clone());
    Ok(store)
  }

  pub async fn is_open(&self) -> bool { self.slot.lock().await.is_some() }

  /// Drop the cached handle and close its connection. A no-op when nothing
  /// is open.
  pub async fn close(&self) -> Result<()> {
    let taken = self.slot.lock().await.take();
    if let Some(store) = taken {
      store.close().await?;
      info!(path = %self.path.display(), "performance store closed");
    }
    Ok(())
  }
}

// ─── PerformanceStore impl ───────────────────────────────────────────────────

fn stats_for(conn: &Connection, dataset_id: i64) -> Result<DatasetStats> {
  let dataset = repo::get_dataset(conn, dataset_id)?;
  Ok(analytics::dataset_stats(
    dataset,
    repo::count_links(conn, dataset_id)?,
    &repo::dataset_scores(conn, dataset_id)?,
    &repo::list_competencies(conn)?,
  ))
}

fn performance_for(
  conn: &Connection,
  dataset_id: i64,
  employee_id: i64,
) -> Result<EmployeePerformance> {
  repo::get_dataset(conn, dataset_id)?;
  if repo::get_link(conn, dataset_id, employee_id)?.is_none() {
    return Err(CoreError::not_found(Entity::DatasetEmployee, employee_id).into());
  }
  let employee = repo::get_employee(conn, employee_id)?;
  let scores = repo::employee_scores(conn, dataset_id, employee_id)?;
  Ok(analytics::employee_performance(employee, scores))
}

impl PerformanceStore for SqliteStore {
  type Error = crate::Error;

  // ── Datasets ──────────────────────────────────────────────────────────────

  async fn create_dataset(&self, input: NewDataset) -> Result<Dataset> {
    let dataset = self
      .with_conn(move |conn| {
        repo::insert_dataset(
          conn,
          &input.name,
          input.description.as_deref(),
          input.source_file.as_deref(),
          Utc::now(),
        )
      })
      .await?;
    info!(dataset_id = dataset.id, name = %dataset.name, "created dataset");
    Ok(dataset)
  }

  async fn list_datasets(&self) -> Result<Vec<Dataset>> {
    self.with_conn(|conn| repo::list_datasets(conn)).await
  }

  async fn get_dataset(&self, id: i64) -> Result<Dataset> {
    self.with_conn(move |conn| repo::get_dataset(conn, id)).await
  }

  async fn update_dataset(
    &self,
    id: i64,
    name: String,
    description: Option<String>,
  ) -> Result<Dataset> {
    self
      .with_conn(move |conn| {
        repo::update_dataset(conn, id, &name, description.as_deref(), Utc::now())
      })
      .await
  }

  async fn delete_dataset(&self, id: i64) -> Result<()> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        repo::delete_dataset(&tx, id)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    info!(dataset_id = id, "deleted dataset");
    Ok(())
  }

  async fn merge_datasets(&self, request: MergeRequest) -> Result<MergeResult> {
    self
      .with_conn(move |conn| import::merge_datasets(conn, &request))
      .await
  }

  // ── Employee master data ──────────────────────────────────────────────────

  async fn import_employees(&self, rows: Vec<EmployeeRow>) -> Result<EmployeeImportResult> {
    self
      .with_conn(move |conn| import::import_employees(conn, &rows))
      .await
  }

  async fn append_dataset_employees(
    &self,
    dataset_id: i64,
    rows: Vec<EmployeeRow>,
  ) -> Result<DatasetEmployeeAppendResult> {
    self
      .with_conn(move |conn| import::append_dataset_employees(conn, dataset_id, &rows))
      .await
  }

  async fn list_all_employees(&self) -> Result<Vec<Employee>> {
    self.with_conn(|conn| repo::list_all_employees(conn)).await
  }

  async fn bulk_update_employees(&self, updates: Vec<EmployeeUpdate>) -> Result<usize> {
    let updated = self
      .with_conn(move |conn| {
        let now = Utc::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut updated = 0;
        for (row, update) in updates.iter().enumerate() {
          if repo::apply_employee_update(&tx, row, update, now)? {
            updated += 1;
          }
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    info!(updated, "bulk-updated employees");
    Ok(updated)
  }

  async fn bulk_delete_employees(&self, ids: Vec<i64>) -> Result<usize> {
    let deleted = self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut deleted = 0;
        for id in ids {
          if repo::delete_employee(&tx, id)? {
            deleted += 1;
          }
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;
    info!(deleted, "bulk-deleted employees");
    Ok(deleted)
  }

  // ── Performance ───────────────────────────────────────────────────────────

  async fn import_performance_dataset(
    &self,
    input: PerformanceImport,
  ) -> Result<PerformanceImportResult> {
    self
      .with_conn(move |conn| import::import_performance_dataset(conn, &input))
      .await
  }

  async fn append_performance(
    &self,
    dataset_id: i64,
    input: PerformanceAppend,
  ) -> Result<PerformanceAppendResult> {
    self
      .with_conn(move |conn| import::append_performance(conn, dataset_id, &input))
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list_employees<'a>(
    &'a self,
    dataset_id: i64,
    query: &'a EmployeeQuery,
  ) -> Result<EmployeeListing> {
    let query = query.clone();
    self
      .with_conn(move |conn| {
        repo::get_dataset(conn, dataset_id)?;
        let linked = repo::linked_employees(conn, dataset_id)?;
        let scores = repo::dataset_scores(conn, dataset_id)?;
        Ok(analytics::list_employees(linked, &scores, &query))
      })
      .await
  }

  async fn employee_performance(
    &self,
    dataset_id: i64,
    employee_id: i64,
  ) -> Result<EmployeePerformance> {
    self
      .with_conn(move |conn| performance_for(conn, dataset_id, employee_id))
      .await
  }

  async fn dataset_stats(&self, dataset_id: i64) -> Result<DatasetStats> {
    self.with_conn(move |conn| stats_for(conn, dataset_id)).await
  }

  async fn dashboard_overview(&self) -> Result<DashboardOverview> {
    self
      .with_conn(|conn| {
        Ok(analytics::dashboard(
          repo::list_datasets(conn)?,
          &repo::list_all_employees(conn)?,
          &repo::list_competencies(conn)?,
          &repo::all_scores(conn)?,
        ))
      })
      .await
  }

  async fn compare_datasets(
    &self,
    base_id: i64,
    comparison_id: i64,
  ) -> Result<DatasetComparison> {
    self
      .with_conn(move |conn| {
        Ok(analytics::compare(
          stats_for(conn, base_id)?,
          stats_for(conn, comparison_id)?,
        ))
      })
      .await
  }

  // ── Summaries ─────────────────────────────────────────────────────────────

  async fn employee_summary(&self, employee_id: i64) -> Result<Option<Summary>> {
    self
      .with_conn(move |conn| repo::get_summary(conn, employee_id))
      .await
  }

  async fn save_employee_summary(
    &self,
    employee_id: i64,
    content: String,
  ) -> Result<Summary> {
    self
      .with_conn(move |conn| {
        repo::get_employee(conn, employee_id)?;
        repo::upsert_summary(conn, employee_id, &content, Utc::now())
      })
      .await
  }

  async fn generate_employee_summary(
    &self,
    dataset_id: i64,
    employee_id: i64,
  ) -> Result<String> {
    let performance = self
      .with_conn(move |conn| performance_for(conn, dataset_id, employee_id))
      .await?;
    Ok(summary::compose(&performance))
  }
}
