//! Request and result types for the multi-entity import operations, plus the
//! rating-mapping rules every import path shares.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  model::{Dataset, RatingRow, ScoreRow, clean},
};

// ─── Employee master data ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeImportResult {
  pub inserted: usize,
  pub updated:  usize,
  /// Distinct identities in the batch.
  pub total:    usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEmployeeAppendResult {
  pub created: usize,
  pub updated: usize,
  /// Links newly created; employees already in the dataset are not counted.
  pub linked:  usize,
}

// ─── Performance ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::PerformanceStore::import_performance_dataset`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceImport {
  pub dataset_name:        String,
  #[serde(default)]
  pub dataset_description: Option<String>,
  #[serde(default)]
  pub source_file:         Option<String>,
  /// Employees to link; each must already exist in the master list.
  #[serde(default)]
  pub employee_names:      Vec<String>,
  #[serde(default)]
  pub scores:              Vec<ScoreRow>,
  #[serde(default)]
  pub rating_mappings:     Vec<RatingRow>,
}

impl PerformanceImport {
  pub fn performance(&self) -> PerformanceAppend {
    PerformanceAppend {
      employee_names:  self.employee_names.clone(),
      scores:          self.scores.clone(),
      rating_mappings: self.rating_mappings.clone(),
    }
  }
}

/// Input to [`crate::store::PerformanceStore::append_performance`]: the same
/// rows as a [`PerformanceImport`], aimed at an existing dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceAppend {
  #[serde(default)]
  pub employee_names:  Vec<String>,
  #[serde(default)]
  pub scores:          Vec<ScoreRow>,
  #[serde(default)]
  pub rating_mappings: Vec<RatingRow>,
}

impl PerformanceAppend {
  /// Every employee name the payload refers to, trimmed and in first-seen
  /// order, each paired with the row that introduced it: its index in
  /// `employee_names`, or in `scores` when only score rows mention it.
  ///
  /// Blank entries in `employee_names` are skipped; a score row with a blank
  /// employee name fails with [`Error::BlankName`] carrying its score index.
  pub fn referenced_names(&self) -> Result<Vec<(usize, String)>> {
    let mut names: Vec<(usize, String)> = Vec::new();
    let mut push = |row: usize, name: &str| {
      if !names.iter().any(|(_, n)| n == name) {
        names.push((row, name.to_owned()));
      }
    };

    for (row, name) in self.employee_names.iter().enumerate() {
      let name = name.trim();
      if !name.is_empty() {
        push(row, name);
      }
    }
    for (row, score) in self.scores.iter().enumerate() {
      let name = score.employee_name.trim();
      if name.is_empty() {
        return Err(Error::BlankName { row });
      }
      push(row, name);
    }
    Ok(names)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceImportResult {
  pub dataset:          Dataset,
  pub employee_count:   usize,
  pub competency_count: usize,
  /// One per `(employee, competency)` pair; a repeated pair keeps its last rating.
  pub score_count:      usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceAppendResult {
  pub employee_count:   usize,
  pub competency_count: usize,
  /// Scores inserted or re-rated; unchanged ratings are not counted.
  pub score_count:      usize,
  pub mapping_count:    usize,
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequest {
  pub source_dataset_ids: Vec<i64>,
  pub target_name:        String,
  #[serde(default)]
  pub target_description: Option<String>,
}

/// A [`MergeRequest`] that passed [`MergeRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMerge {
  /// Distinct ids in request order.
  pub source_ids:  Vec<i64>,
  pub name:        String,
  pub description: Option<String>,
}

impl MergeRequest {
  pub fn validate(&self) -> Result<ValidMerge> {
    let mut source_ids: Vec<i64> = Vec::new();
    for id in &self.source_dataset_ids {
      if !source_ids.contains(id) {
        source_ids.push(*id);
      }
    }
    if source_ids.len() < 2 {
      return Err(Error::NotEnoughDatasets { given: source_ids.len() });
    }

    let name = self.target_name.trim();
    if name.is_empty() {
      return Err(Error::BlankDatasetName);
    }

    Ok(ValidMerge {
      source_ids,
      name: name.to_owned(),
      description: clean(self.target_description.as_deref()),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
  pub dataset:              Dataset,
  pub source_dataset_ids:   Vec<i64>,
  pub employee_count:       usize,
  pub score_count:          usize,
  pub rating_mapping_count: usize,
}

// ─── Rating mappings ─────────────────────────────────────────────────────────

pub fn default_rating_mappings() -> Vec<RatingRow> {
  vec![
    RatingRow::new("Sangat Baik", 85.0),
    RatingRow::new("Baik", 75.0),
    RatingRow::new("Kurang Baik", 65.0),
  ]
}

/// Lookup key for a rating text: trimmed and lower-cased.
pub fn rating_key(text: &str) -> String { text.trim().to_lowercase() }

/// Case-insensitive rating lookup built from caller-supplied rows.
///
/// Blank texts are skipped; when two rows share a key the later one wins.
#[derive(Debug, Clone, Default)]
pub struct RatingTable {
  by_key: HashMap<String, f64>,
  rows:   Vec<RatingRow>,
}

impl RatingTable {
  pub fn new(rows: &[RatingRow]) -> Self {
    let mut table = Self::default();
    for row in rows {
      table.insert(row);
    }
    table
  }

  fn insert(&mut self, row: &RatingRow) {
    let key = rating_key(&row.text_value);
    if key.is_empty() {
      return;
    }
    let text = row.text_value.trim().to_owned();
    match self.by_key.insert(key.clone(), row.numeric_value) {
      Some(_) => {
        if let Some(existing) =
          self.rows.iter_mut().find(|r| rating_key(&r.text_value) == key)
        {
          existing.numeric_value = row.numeric_value;
        }
      }
      None => self.rows.push(RatingRow::new(text, row.numeric_value)),
    }
  }

  /// Resolve a raw score value. `None` when unmapped.
  pub fn resolve(&self, raw: &str) -> Option<f64> {
    self.by_key.get(&rating_key(raw)).copied()
  }

  /// The distinct mappings, trimmed, in first-seen order.
  pub fn rows(&self) -> &[RatingRow] { &self.rows }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}
