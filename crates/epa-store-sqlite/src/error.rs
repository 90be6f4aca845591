//! Error type for `epa-store-sqlite`.

use epa_core::{Classify, ErrorKind};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] epa_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// The schema could not be brought from `from` to `to`; nothing was
  /// changed on disk.
  #[error("schema upgrade from version {from} to {to} failed: {reason}")]
  Upgrade { from: u32, to: u32, reason: String },

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether `e` is a UNIQUE or PRIMARY KEY conflict.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

fn sqlite_kind(e: &rusqlite::Error) -> ErrorKind {
  match e {
    rusqlite::Error::SqliteFailure(f, _)
      if f.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      ErrorKind::ConstraintViolation
    }
    _ => ErrorKind::StorageFailure,
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Sqlite(e) | Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => {
        sqlite_kind(e)
      }
      Self::Database(_) | Self::DateParse(_) => ErrorKind::StorageFailure,
      Self::Upgrade { .. } => ErrorKind::UpgradeFailure,
    }
  }
}
