//! Multi-entity import, append and merge.
//!
//! Each operation validates and resolves everything it can before its first
//! write, then commits in one or two transactions. A failure in a later
//! transaction leaves the earlier ones committed (the created dataset, say).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use epa_core::{
  Error as CoreError,
  identity::{CollapsedEmployee, collapse_rows, merge_employee_fields, normalize},
  import::{
    DatasetEmployeeAppendResult, EmployeeImportResult, MergeRequest,
    MergeResult, PerformanceAppend, PerformanceAppendResult,
    PerformanceImport, PerformanceImportResult, RatingTable,
  },
  model::{EmployeeRow, RatingRow, ScoreRow},
};
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::{
  Result,
  repo::{self, Rated},
};

// ─── Employees ───────────────────────────────────────────────────────────────

/// Create the identity, or fill the blanks of the employee already carrying
/// its key. The stored display name is kept. Returns the employee id and
/// whether it was created.
fn upsert_identity(
  conn: &Connection,
  entry: &CollapsedEmployee,
  now: DateTime<Utc>,
) -> Result<(i64, bool)> {
  match repo::find_employee_by_key(conn, &entry.key)? {
    Some(existing) => {
      let merged = merge_employee_fields(&existing.fields(), &entry.fields);
      repo::write_employee_fields(conn, existing.id, &merged, now)?;
      Ok((existing.id, false))
    }
    None => {
      let created = repo::insert_employee(conn, &entry.name, &entry.fields, now)?;
      Ok((created.id, true))
    }
  }
}

pub fn import_employees(
  conn: &mut Connection,
  rows: &[EmployeeRow],
) -> Result<EmployeeImportResult> {
  let collapsed = collapse_rows(rows)?;
  let now = Utc::now();

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut result = EmployeeImportResult { total: collapsed.len(), ..Default::default() };
  for entry in &collapsed {
    match upsert_identity(&tx, entry, now)? {
      (_, true) => result.inserted += 1,
      (_, false) => result.updated += 1,
    }
  }
  tx.commit()?;

  info!(
    rows = rows.len(),
    inserted = result.inserted,
    updated = result.updated,
    "imported employees"
  );
  Ok(result)
}

pub fn append_dataset_employees(
  conn: &mut Connection,
  dataset_id: i64,
  rows: &[EmployeeRow],
) -> Result<DatasetEmployeeAppendResult> {
  repo::get_dataset(conn, dataset_id)?;
  let collapsed = collapse_rows(rows)?;
  let now = Utc::now();

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut result = DatasetEmployeeAppendResult::default();
  for entry in &collapsed {
    let (employee_id, created) = upsert_identity(&tx, entry, now)?;
    if created {
      result.created += 1;
    } else {
      result.updated += 1;
    }
    if repo::link_employee(&tx, dataset_id, employee_id, now)? {
      result.linked += 1;
    }
  }
  repo::touch_dataset(&tx, dataset_id, now)?;
  tx.commit()?;

  info!(
    dataset_id,
    created = result.created,
    updated = result.updated,
    linked = result.linked,
    "appended employees to dataset"
  );
  Ok(result)
}

// ─── Performance ─────────────────────────────────────────────────────────────

/// Trimmed employee names mapped to the employees they resolve to.
struct Roster {
  by_name:   HashMap<String, i64>,
  /// Distinct employee ids in first-reference order.
  employees: Vec<i64>,
}

/// Resolve every referenced name against the master list. Nothing is
/// written; an unknown name fails the whole operation.
fn resolve_roster(conn: &Connection, payload: &PerformanceAppend) -> Result<Roster> {
  let mut roster = Roster { by_name: HashMap::new(), employees: Vec::new() };
  for (row, name) in payload.referenced_names()? {
    let employee = repo::find_employee_by_key(conn, &normalize(&name))?
      .ok_or_else(|| CoreError::UnknownEmployee { row, name: name.clone() })?;
    if !roster.employees.contains(&employee.id) {
      roster.employees.push(employee.id);
    }
    roster.by_name.insert(name, employee.id);
  }
  Ok(roster)
}

fn check_competencies(scores: &[ScoreRow]) -> Result<()> {
  match scores.iter().position(|s| s.competency.trim().is_empty()) {
    Some(row) => Err(
      CoreError::InvalidInput(format!("competency cannot be blank (score row {row})"))
        .into(),
    ),
    None => Ok(()),
  }
}

#[derive(Debug, Default)]
struct Written {
  employees:    usize,
  competencies: usize,
  scores:       usize,
}

/// Link the roster, resolve competencies in first-seen order and rate each
/// `(employee, competency)` pair; a later rating replaces an earlier one.
fn write_performance(
  conn: &Connection,
  dataset_id: i64,
  roster: &Roster,
  scores: &[ScoreRow],
  ratings: &RatingTable,
  now: DateTime<Utc>,
) -> Result<Written> {
  let mut written = Written::default();

  for employee_id in &roster.employees {
    repo::link_employee(conn, dataset_id, *employee_id, now)?;
    written.employees += 1;
  }

  let mut competencies: HashMap<&str, i64> = HashMap::new();
  for (row, score) in scores.iter().enumerate() {
    let name = score.employee_name.trim();
    let employee_id = *roster.by_name.get(name).ok_or_else(|| {
      CoreError::UnknownEmployee { row, name: name.to_owned() }
    })?;

    let competency = score.competency.trim();
    let competency_id = match competencies.get(competency) {
      Some(id) => *id,
      None => {
        let (resolved, _) = repo::resolve_competency(conn, competency)?;
        competencies.insert(competency, resolved.id);
        resolved.id
      }
    };

    let rated = repo::rate(
      conn,
      employee_id,
      dataset_id,
      competency_id,
      &score.value,
      ratings.resolve(&score.value),
      now,
    )?;
    if rated != Rated::Unchanged {
      written.scores += 1;
    }
  }
  written.competencies = competencies.len();

  Ok(written)
}

pub fn import_performance_dataset(
  conn: &mut Connection,
  input: &PerformanceImport,
) -> Result<PerformanceImportResult> {
  if input.dataset_name.trim().is_empty() {
    return Err(CoreError::BlankDatasetName.into());
  }
  let payload = input.performance();
  let roster = resolve_roster(conn, &payload)?;
  check_competencies(&payload.scores)?;
  let ratings = RatingTable::new(&payload.rating_mappings);
  let now = Utc::now();

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let dataset = repo::insert_dataset(
    &tx,
    &input.dataset_name,
    input.dataset_description.as_deref(),
    input.source_file.as_deref(),
    now,
  )?;
  for mapping in ratings.rows() {
    repo::insert_mapping_if_missing(
      &tx,
      dataset.id,
      &mapping.text_value,
      mapping.numeric_value,
    )?;
  }
  tx.commit()?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let written = write_performance(&tx, dataset.id, &roster, &payload.scores, &ratings, now)?;
  tx.commit()?;

  info!(
    dataset_id = dataset.id,
    employees = written.employees,
    competencies = written.competencies,
    scores = written.scores,
    mappings = ratings.rows().len(),
    "imported performance dataset"
  );
  Ok(PerformanceImportResult {
    dataset,
    employee_count: written.employees,
    competency_count: written.competencies,
    score_count: written.scores,
  })
}

pub fn append_performance(
  conn: &mut Connection,
  dataset_id: i64,
  payload: &PerformanceAppend,
) -> Result<PerformanceAppendResult> {
  repo::get_dataset(conn, dataset_id)?;
  let roster = resolve_roster(conn, payload)?;
  check_competencies(&payload.scores)?;
  let incoming = RatingTable::new(&payload.rating_mappings);
  let now = Utc::now();

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  for mapping in incoming.rows() {
    repo::upsert_mapping(&tx, dataset_id, &mapping.text_value, mapping.numeric_value)?;
  }
  let stored: Vec<RatingRow> = repo::dataset_mappings(&tx, dataset_id)?
    .into_iter()
    .map(|m| RatingRow::new(m.text_value, m.numeric_value))
    .collect();
  let ratings = RatingTable::new(&stored);

  // Stored scores follow the mappings that were just changed.
  if !incoming.is_empty() {
    for score in repo::dataset_scores(&tx, dataset_id)? {
      let Some(value) = incoming.resolve(&score.raw_value) else {
        continue;
      };
      if score.numeric_value != Some(value) {
        repo::set_score_value(&tx, score.id, Some(value))?;
      }
    }
  }

  let written = write_performance(&tx, dataset_id, &roster, &payload.scores, &ratings, now)?;
  repo::touch_dataset(&tx, dataset_id, now)?;
  tx.commit()?;

  let result = PerformanceAppendResult {
    employee_count:   written.employees,
    competency_count: written.competencies,
    score_count:      written.scores,
    mapping_count:    incoming.rows().len(),
  };
  info!(
    dataset_id,
    employees = result.employee_count,
    competencies = result.competency_count,
    scores = result.score_count,
    mappings = result.mapping_count,
    "appended performance"
  );
  Ok(result)
}

// ─── Merge ───────────────────────────────────────────────────────────────────

pub fn merge_datasets(conn: &mut Connection, request: &MergeRequest) -> Result<MergeResult> {
  let merge = request.validate()?;
  for id in &merge.source_ids {
    repo::get_dataset(conn, *id)?;
  }
  let now = Utc::now();

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let dataset =
    repo::insert_dataset(&tx, &merge.name, merge.description.as_deref(), None, now)?;
  tx.commit()?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let employees = repo::employees_linked_to_any(&tx, &merge.source_ids)?;
  for employee_id in &employees {
    repo::link_employee(&tx, dataset.id, *employee_id, now)?;
  }

  let mut score_count = 0;
  let mut rating_mapping_count = 0;
  for source in &merge.source_ids {
    for score in repo::dataset_scores(&tx, *source)? {
      if repo::insert_score(
        &tx,
        score.employee_id,
        dataset.id,
        score.competency_id,
        &score.raw_value,
        score.numeric_value,
        now,
      )? {
        score_count += 1;
      }
    }
    for mapping in repo::dataset_mappings(&tx, *source)? {
      if repo::insert_mapping_if_missing(
        &tx,
        dataset.id,
        &mapping.text_value,
        mapping.numeric_value,
      )? {
        rating_mapping_count += 1;
      }
    }
  }
  tx.commit()?;

  info!(
    dataset_id = dataset.id,
    sources = ?merge.source_ids,
    employees = employees.len(),
    scores = score_count,
    mappings = rating_mapping_count,
    "merged datasets"
  );
  Ok(MergeResult {
    dataset,
    source_dataset_ids: merge.source_ids,
    employee_count: employees.len(),
    score_count,
    rating_mapping_count,
  })
}
