//! Pre-import validation.
//!
//! [`validate_import`] inspects a proposed payload and reports every
//! inconsistency it finds as data. It never touches a store and keeps no
//! state between calls, so callers can edit the payload and simply run it
//! again.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{EmployeeRow, RatingRow, ScoreRow};

/// Everything a caller proposes to import in one go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportPayload {
  #[serde(default)]
  pub employees:       Vec<EmployeeRow>,
  #[serde(default)]
  pub scores:          Vec<ScoreRow>,
  #[serde(default)]
  pub rating_mappings: Vec<RatingRow>,
}

// ─── Issues ──────────────────────────────────────────────────────────────────

/// Employee rows whose names collide case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEmployeeGroup {
  /// Display name of the first colliding row.
  pub name:             String,
  pub employee_indices: Vec<usize>,
}

/// A score row whose employee name matches no employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanScore {
  pub score_index:   usize,
  pub employee_name: String,
  pub competency:    String,
}

/// A raw rating value with no numeric mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedRating {
  /// The value as first seen, trimmed.
  pub value:       String,
  pub occurrences: usize,
}

/// An employee row whose name is empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankEmployeeName {
  pub employee_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
  pub error_count:   usize,
  /// Reserved for non-blocking issue classes; currently always zero.
  pub warning_count: usize,
  pub total_issues:  usize,
  pub can_import:    bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub stats:                ValidationStats,
  pub duplicate_employees:  Vec<DuplicateEmployeeGroup>,
  pub orphan_scores:        Vec<OrphanScore>,
  pub unmapped_ratings:     Vec<UnmappedRating>,
  pub blank_employee_names: Vec<BlankEmployeeName>,
}

impl ValidationReport {
  pub fn can_import(&self) -> bool { self.stats.can_import }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

fn name_key(name: &str) -> String { name.trim().to_lowercase() }

/// Classify every blocking inconsistency in `payload`.
///
/// Groups and unmapped values are reported in first-seen order.
pub fn validate_import(payload: &ImportPayload) -> ValidationReport {
  let mut blank_employee_names = Vec::new();
  let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
  let mut known: HashSet<String> = HashSet::new();

  for (idx, employee) in payload.employees.iter().enumerate() {
    let key = name_key(&employee.name);
    if key.is_empty() {
      blank_employee_names.push(BlankEmployeeName { employee_index: idx });
      continue;
    }
    match groups.iter_mut().find(|(k, _)| *k == key) {
      Some((_, indices)) => indices.push(idx),
      None => groups.push((key.clone(), vec![idx])),
    }
    known.insert(key);
  }

  let duplicate_employees = groups
    .into_iter()
    .filter(|(_, indices)| indices.len() > 1)
    .map(|(_, indices)| DuplicateEmployeeGroup {
      name:             payload.employees[indices[0]].name.trim().to_owned(),
      employee_indices: indices,
    })
    .collect();

  let mapped: HashSet<String> = payload
    .rating_mappings
    .iter()
    .map(|m| name_key(&m.text_value))
    .filter(|k| !k.is_empty())
    .collect();

  let mut orphan_scores = Vec::new();
  let mut unmapped: Vec<(String, UnmappedRating)> = Vec::new();
  let mut unmapped_slot: HashMap<String, usize> = HashMap::new();

  for (idx, score) in payload.scores.iter().enumerate() {
    let employee = name_key(&score.employee_name);
    if employee.is_empty() || !known.contains(&employee) {
      orphan_scores.push(OrphanScore {
        score_index:   idx,
        employee_name: score.employee_name.clone(),
        competency:    score.competency.clone(),
      });
    }

    let value = name_key(&score.value);
    if value.is_empty() || mapped.contains(&value) {
      continue;
    }
    match unmapped_slot.get(&value) {
      Some(&slot) => unmapped[slot].1.occurrences += 1,
      None => {
        unmapped_slot.insert(value.clone(), unmapped.len());
        unmapped.push((value, UnmappedRating {
          value:       score.value.trim().to_owned(),
          occurrences: 1,
        }));
      }
    }
  }

  let unmapped_ratings: Vec<UnmappedRating> =
    unmapped.into_iter().map(|(_, issue)| issue).collect();

  let report = ValidationReport {
    stats: ValidationStats {
      error_count:   0,
      warning_count: 0,
      total_issues:  0,
      can_import:    false,
    },
    duplicate_employees,
    orphan_scores,
    unmapped_ratings,
    blank_employee_names,
  };
  finish(report)
}

fn finish(mut report: ValidationReport) -> ValidationReport {
  let error_count = report.duplicate_employees.len()
    + report.orphan_scores.len()
    + report.unmapped_ratings.len()
    + report.blank_employee_names.len();

  report.stats = ValidationStats {
    error_count,
    warning_count: 0,
    total_issues: error_count,
    can_import: error_count == 0,
  };
  report
}
