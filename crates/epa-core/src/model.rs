//! Entity types, the records a performance store persists.
//!
//! Every entity is keyed by an auto-assigned integer identity. Employees are
//! global: they are shared between datasets through [`DatasetEmployeeLink`]
//! records rather than owned by any one dataset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ─── Datasets ────────────────────────────────────────────────────────────────

/// One imported performance evaluation (e.g. "Penilaian 2024 Semester 1").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  pub id:          i64,
  pub name:        String,
  pub description: Option<String>,
  /// Label of the file the dataset was imported from, if any.
  pub source_file: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::PerformanceStore::create_dataset`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDataset {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub source_file: Option<String>,
}

impl NewDataset {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Default::default() }
  }
}

// ─── Employees ───────────────────────────────────────────────────────────────

/// A person in the global employee master list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
  pub id:          i64,
  pub name:        String,
  /// Civil-servant registration number.
  pub nip:         Option<String>,
  /// Rank (golongan), e.g. `III/a`.
  pub gol:         Option<String>,
  /// Position title.
  pub jabatan:     Option<String>,
  pub sub_jabatan: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Employee {
  pub fn fields(&self) -> EmployeeFields {
    EmployeeFields {
      nip:         self.nip.clone(),
      gol:         self.gol.clone(),
      jabatan:     self.jabatan.clone(),
      sub_jabatan: self.sub_jabatan.clone(),
    }
  }
}

/// The optional attributes of an employee, already trimmed; blank values are
/// represented as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFields {
  pub nip:         Option<String>,
  pub gol:         Option<String>,
  pub jabatan:     Option<String>,
  pub sub_jabatan: Option<String>,
}

impl EmployeeFields {
  pub fn from_row(row: &EmployeeRow) -> Self {
    Self {
      nip:         clean(row.nip.as_deref()),
      gol:         clean(row.gol.as_deref()),
      jabatan:     clean(row.jabatan.as_deref()),
      sub_jabatan: clean(row.sub_jabatan.as_deref()),
    }
  }
}

/// Join record binding a global [`Employee`] to a [`Dataset`]. Unique on
/// `(dataset_id, employee_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEmployeeLink {
  pub id:          i64,
  pub dataset_id:  i64,
  pub employee_id: i64,
  pub created_at:  DateTime<Utc>,
  /// Refreshed every time the employee is re-associated with the dataset.
  pub updated_at:  DateTime<Utc>,
}

/// Partial update for one employee, as accepted by
/// [`crate::store::PerformanceStore::bulk_update_employees`].
///
/// For the optional attributes, an absent key leaves the column alone, an
/// explicit `null` clears it and a value sets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeUpdate {
  pub id:          i64,
  #[serde(default)]
  pub name:        Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub nip:         Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub gol:         Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub jabatan:     Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub sub_jabatan: Option<Option<String>>,
}

impl EmployeeUpdate {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.nip.is_none()
      && self.gol.is_none()
      && self.jabatan.is_none()
      && self.sub_jabatan.is_none()
  }
}

/// Distinguishes an explicit `null` from a missing key.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

// ─── Competencies, scores, ratings ───────────────────────────────────────────

/// An evaluated competency. Names are unique (case-sensitive) across the
/// whole store; `display_order` is the first-seen order across imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
  pub id:            i64,
  pub name:          String,
  pub description:   Option<String>,
  pub display_order: i64,
}

/// One rating of one employee for one competency inside one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
  pub id:            i64,
  pub employee_id:   i64,
  pub dataset_id:    i64,
  pub competency_id: i64,
  /// The rating exactly as imported.
  pub raw_value:     String,
  /// `None` when the raw value had no rating mapping at import time.
  pub numeric_value: Option<f64>,
  pub created_at:    DateTime<Utc>,
}

/// Maps a textual rating (e.g. "Baik") to a number within one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingMapping {
  pub id:            i64,
  pub dataset_id:    i64,
  pub text_value:    String,
  pub numeric_value: f64,
}

/// Cached narrative for an employee; at most one per employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  pub id:          i64,
  pub employee_id: i64,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── Import rows ─────────────────────────────────────────────────────────────

/// An employee row as produced by the CSV collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRow {
  pub name:        String,
  #[serde(default)]
  pub nip:         Option<String>,
  #[serde(default)]
  pub gol:         Option<String>,
  #[serde(default)]
  pub jabatan:     Option<String>,
  #[serde(default)]
  pub sub_jabatan: Option<String>,
}

impl EmployeeRow {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Default::default() }
  }
}

/// A score row as produced by the CSV collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
  pub employee_name: String,
  pub competency:    String,
  pub value:         String,
}

impl ScoreRow {
  pub fn new(
    employee_name: impl Into<String>,
    competency: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    Self {
      employee_name: employee_name.into(),
      competency:    competency.into(),
      value:         value.into(),
    }
  }
}

/// A proposed rating mapping, not yet bound to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRow {
  pub text_value:    String,
  pub numeric_value: f64,
}

impl RatingRow {
  pub fn new(text_value: impl Into<String>, numeric_value: f64) -> Self {
    Self { text_value: text_value.into(), numeric_value }
  }
}

/// Trim `value`, mapping blank strings to `None`.
pub fn clean(value: Option<&str>) -> Option<String> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn update_distinguishes_null_from_missing() {
    let update: EmployeeUpdate =
      serde_json::from_str(r#"{"id": 4, "nip": null, "gol": "III/b"}"#).unwrap();

    assert_eq!(update.nip, Some(None));
    assert_eq!(update.gol, Some(Some("III/b".into())));
    assert_eq!(update.jabatan, None);
    assert!(!update.is_empty());
  }

  #[test]
  fn fields_from_row_drop_blanks() {
    let row = EmployeeRow {
      name:        "Ana".into(),
      nip:         Some("  1987  ".into()),
      gol:         Some("   ".into()),
      jabatan:     None,
      sub_jabatan: Some("Keuangan".into()),
    };
    let fields = EmployeeFields::from_row(&row);
    assert_eq!(fields.nip.as_deref(), Some("1987"));
    assert_eq!(fields.gol, None);
    assert_eq!(fields.sub_jabatan.as_deref(), Some("Keuangan"));
  }
}
