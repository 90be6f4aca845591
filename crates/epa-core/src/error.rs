//! Error types for `epa-core`.

use serde::Serialize;
use thiserror::Error;

/// The entity collection an identity failed to resolve in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Entity {
  Dataset,
  Employee,
  DatasetEmployee,
  Competency,
  Score,
  RatingMapping,
  Summary,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} {id} not found")]
  NotFound { entity: Entity, id: i64 },

  #[error("employee name cannot be blank (row {row})")]
  BlankName { row: usize },

  #[error("dataset name cannot be empty")]
  BlankDatasetName,

  #[error("employee not found in master data: {name:?} (row {row})")]
  UnknownEmployee { row: usize, name: String },

  #[error("select at least two datasets to merge (got {given})")]
  NotEnoughDatasets { given: usize },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("constraint violation: {0}")]
  ConstraintViolation(String),
}

impl Error {
  pub fn not_found(entity: Entity, id: i64) -> Self {
    Self::NotFound { entity, id }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// Coarse classification shared by every error type in the workspace.
///
/// Business-rule findings (duplicates, orphans, unmapped ratings) are never
/// errors; they are reported by [`crate::validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// An identity did not resolve.
  NotFound,
  /// A unique index rejected a write.
  ConstraintViolation,
  /// A required field was blank or a request was malformed.
  InvalidInput,
  /// The schema upgrade at open time failed; the store is unusable.
  UpgradeFailure,
  /// The underlying database reported an error.
  StorageFailure,
}

/// Implemented by every error type a [`crate::store::PerformanceStore`] can
/// return, so transport layers can map failures without downcasting.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::BlankName { .. }
      | Self::BlankDatasetName
      | Self::UnknownEmployee { .. }
      | Self::NotEnoughDatasets { .. }
      | Self::InvalidInput(_) => ErrorKind::InvalidInput,
      Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
    }
  }
}
