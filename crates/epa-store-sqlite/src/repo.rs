//! Typed CRUD primitives over each table.
//!
//! Every function takes a plain [`Connection`]; callers that need several
//! writes to land together pass a [`rusqlite::Transaction`] (which derefs to
//! one). Lookups by unique index tolerate concurrent inserts: a uniqueness
//! conflict falls back to loading the row that won.

use chrono::{DateTime, Utc};
use epa_core::{
  Entity, Error as CoreError,
  analytics::ScoreWithCompetency,
  identity::normalize,
  model::{
    Competency, Dataset, DatasetEmployeeLink, Employee, EmployeeFields,
    EmployeeUpdate, RatingMapping, Score, Summary, clean,
  },
};
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::{debug, warn};

use crate::{
  Result,
  encode::{
    COMPETENCY_COLUMNS, DATASET_COLUMNS, EMPLOYEE_COLUMNS, LINK_COLUMNS,
    MAPPING_COLUMNS, RawDataset, RawEmployee, RawLink, RawScore, RawSummary,
    SCORE_COLUMNS, SUMMARY_COLUMNS, competency_at, competency_from_row,
    encode_dt, mapping_from_row,
  },
  error::is_unique_violation,
};

/// Run an insert, reporting a uniqueness conflict as `Ok(false)`.
fn insert_if_missing(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<bool> {
  match conn.execute(sql, params) {
    Ok(_) => Ok(true),
    Err(e) if is_unique_violation(&e) => Ok(false),
    Err(e) => Err(e.into()),
  }
}

// ─── Datasets ────────────────────────────────────────────────────────────────

pub fn insert_dataset(
  conn: &Connection,
  name: &str,
  description: Option<&str>,
  source_file: Option<&str>,
  now: DateTime<Utc>,
) -> Result<Dataset> {
  let name = name.trim();
  if name.is_empty() {
    return Err(CoreError::BlankDatasetName.into());
  }
  let at = encode_dt(now);
  conn.execute(
    "INSERT INTO datasets (name, description, source_file, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?4)",
    params![name, clean(description), clean(source_file), at],
  )?;
  get_dataset(conn, conn.last_insert_rowid())
}

pub fn get_dataset(conn: &Connection, id: i64) -> Result<Dataset> {
  conn
    .query_row(
      &format!("SELECT {DATASET_COLUMNS} FROM datasets d WHERE d.id = ?1"),
      params![id],
      RawDataset::from_row,
    )
    .optional()?
    .ok_or(CoreError::not_found(Entity::Dataset, id))?
    .into_dataset()
}

/// Newest first.
pub fn list_datasets(conn: &Connection) -> Result<Vec<Dataset>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {DATASET_COLUMNS} FROM datasets d ORDER BY d.created_at DESC, d.id DESC"
  ))?;
  stmt
    .query_map([], RawDataset::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawDataset::into_dataset)
    .collect()
}

pub fn update_dataset(
  conn: &Connection,
  id: i64,
  name: &str,
  description: Option<&str>,
  now: DateTime<Utc>,
) -> Result<Dataset> {
  let name = name.trim();
  if name.is_empty() {
    return Err(CoreError::BlankDatasetName.into());
  }
  let changed = conn.execute(
    "UPDATE datasets SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
    params![name, clean(description), encode_dt(now), id],
  )?;
  if changed == 0 {
    return Err(CoreError::not_found(Entity::Dataset, id).into());
  }
  get_dataset(conn, id)
}

pub fn touch_dataset(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "UPDATE datasets SET updated_at = ?1 WHERE id = ?2",
    params![encode_dt(now), id],
  )?;
  Ok(())
}

/// Delete a dataset and everything scoped to it.
pub fn delete_dataset(conn: &Connection, id: i64) -> Result<()> {
  conn.execute("DELETE FROM scores WHERE dataset_id = ?1", params![id])?;
  conn.execute("DELETE FROM dataset_employees WHERE dataset_id = ?1", params![id])?;
  conn.execute("DELETE FROM rating_mappings WHERE dataset_id = ?1", params![id])?;
  let deleted = conn.execute("DELETE FROM datasets WHERE id = ?1", params![id])?;
  if deleted == 0 {
    return Err(CoreError::not_found(Entity::Dataset, id).into());
  }
  Ok(())
}

// ─── Employees ───────────────────────────────────────────────────────────────

fn collect_employees(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Employee>> {
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, RawEmployee::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawEmployee::into_employee)
    .collect()
}

pub fn get_employee(conn: &Connection, id: i64) -> Result<Employee> {
  conn
    .query_row(
      &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees e WHERE e.id = ?1"),
      params![id],
      RawEmployee::from_row,
    )
    .optional()?
    .ok_or(CoreError::not_found(Entity::Employee, id))?
    .into_employee()
}

/// The oldest employee carrying the identity key `key`.
pub fn find_employee_by_key(conn: &Connection, key: &str) -> Result<Option<Employee>> {
  conn
    .query_row(
      &format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e
         WHERE e.name_key = ?1 ORDER BY e.id LIMIT 1"
      ),
      params![key],
      RawEmployee::from_row,
    )
    .optional()?
    .map(RawEmployee::into_employee)
    .transpose()
}

pub fn insert_employee(
  conn: &Connection,
  name: &str,
  fields: &EmployeeFields,
  now: DateTime<Utc>,
) -> Result<Employee> {
  conn.execute(
    "INSERT INTO employees (
       name, name_key, nip, gol, jabatan, sub_jabatan, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    params![
      name,
      normalize(name),
      fields.nip,
      fields.gol,
      fields.jabatan,
      fields.sub_jabatan,
      encode_dt(now),
    ],
  )?;
  get_employee(conn, conn.last_insert_rowid())
}

/// Overwrite the optional attributes of an employee and refresh `updated_at`.
pub fn write_employee_fields(
  conn: &Connection,
  id: i64,
  fields: &EmployeeFields,
  now: DateTime<Utc>,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE employees
     SET nip = ?1, gol = ?2, jabatan = ?3, sub_jabatan = ?4, updated_at = ?5
     WHERE id = ?6",
    params![
      fields.nip,
      fields.gol,
      fields.jabatan,
      fields.sub_jabatan,
      encode_dt(now),
      id,
    ],
  )?;
  if changed == 0 {
    return Err(CoreError::not_found(Entity::Employee, id).into());
  }
  Ok(())
}

/// The master list, case-insensitively by name.
pub fn list_all_employees(conn: &Connection) -> Result<Vec<Employee>> {
  collect_employees(
    conn,
    &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees e ORDER BY lower(e.name), e.id"),
    [],
  )
}

pub fn linked_employees(conn: &Connection, dataset_id: i64) -> Result<Vec<Employee>> {
  collect_employees(
    conn,
    &format!(
      "SELECT {EMPLOYEE_COLUMNS} FROM employees e
       JOIN dataset_employees l ON l.employee_id = e.id
       WHERE l.dataset_id = ?1
       ORDER BY e.id"
    ),
    params![dataset_id],
  )
}

/// Apply one partial update. Returns `false` when the employee does not
/// exist or the update names no field.
pub fn apply_employee_update(
  conn: &Connection,
  row: usize,
  update: &EmployeeUpdate,
  now: DateTime<Utc>,
) -> Result<bool> {
  if update.is_empty() {
    return Ok(false);
  }
  let Some(existing) = conn
    .query_row(
      &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees e WHERE e.id = ?1"),
      params![update.id],
      RawEmployee::from_row,
    )
    .optional()?
  else {
    return Ok(false);
  };

  let name = match update.name.as_deref() {
    Some(name) if normalize(name).is_empty() => {
      return Err(CoreError::BlankName { row }.into());
    }
    Some(name) => name.trim().to_owned(),
    None => existing.name,
  };
  let pick = |patch: &Option<Option<String>>, current: Option<String>| match patch {
    Some(value) => clean(value.as_deref()),
    None => current,
  };

  conn.execute(
    "UPDATE employees
     SET name = ?1, name_key = ?2, nip = ?3, gol = ?4, jabatan = ?5,
         sub_jabatan = ?6, updated_at = ?7
     WHERE id = ?8",
    params![
      name,
      normalize(&name),
      pick(&update.nip, existing.nip),
      pick(&update.gol, existing.gol),
      pick(&update.jabatan, existing.jabatan),
      pick(&update.sub_jabatan, existing.sub_jabatan),
      encode_dt(now),
      update.id,
    ],
  )?;
  Ok(true)
}

/// Delete an employee with its scores, links and summary. Returns whether
/// the employee existed.
pub fn delete_employee(conn: &Connection, id: i64) -> Result<bool> {
  conn.execute("DELETE FROM scores WHERE employee_id = ?1", params![id])?;
  conn.execute("DELETE FROM dataset_employees WHERE employee_id = ?1", params![id])?;
  conn.execute("DELETE FROM summaries WHERE employee_id = ?1", params![id])?;
  Ok(conn.execute("DELETE FROM employees WHERE id = ?1", params![id])? > 0)
}

// ─── Links ───────────────────────────────────────────────────────────────────

/// Associate an employee with a dataset. An existing link has its
/// `updated_at` refreshed instead. Returns `true` when a link was created.
pub fn link_employee(
  conn: &Connection,
  dataset_id: i64,
  employee_id: i64,
  now: DateTime<Utc>,
) -> Result<bool> {
  let at = encode_dt(now);
  let created = insert_if_missing(
    conn,
    "INSERT INTO dataset_employees (dataset_id, employee_id, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?3)",
    params![dataset_id, employee_id, at],
  )?;
  if !created {
    conn.execute(
      "UPDATE dataset_employees SET updated_at = ?1
       WHERE dataset_id = ?2 AND employee_id = ?3",
      params![at, dataset_id, employee_id],
    )?;
  }
  Ok(created)
}

pub fn get_link(
  conn: &Connection,
  dataset_id: i64,
  employee_id: i64,
) -> Result<Option<DatasetEmployeeLink>> {
  conn
    .query_row(
      &format!(
        "SELECT {LINK_COLUMNS} FROM dataset_employees l
         WHERE l.dataset_id = ?1 AND l.employee_id = ?2"
      ),
      params![dataset_id, employee_id],
      RawLink::from_row,
    )
    .optional()?
    .map(RawLink::into_link)
    .transpose()
}

pub fn count_links(conn: &Connection, dataset_id: i64) -> Result<usize> {
  Ok(conn.query_row(
    "SELECT COUNT(*) FROM dataset_employees WHERE dataset_id = ?1",
    params![dataset_id],
    |r| r.get(0),
  )?)
}

/// Distinct employees linked to any of `dataset_ids`, in first-link order.
pub fn employees_linked_to_any(
  conn: &Connection,
  dataset_ids: &[i64],
) -> Result<Vec<i64>> {
  let mut stmt = conn.prepare(
    "SELECT employee_id FROM dataset_employees WHERE dataset_id = ?1 ORDER BY id",
  )?;
  let mut ids: Vec<i64> = Vec::new();
  for dataset_id in dataset_ids {
    for id in stmt.query_map(params![dataset_id], |r| r.get::<_, i64>(0))? {
      let id = id?;
      if !ids.contains(&id) {
        ids.push(id);
      }
    }
  }
  Ok(ids)
}

// ─── Competencies ────────────────────────────────────────────────────────────

pub fn find_competency(conn: &Connection, name: &str) -> Result<Option<Competency>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {COMPETENCY_COLUMNS} FROM competencies c WHERE c.name = ?1"),
        params![name],
        competency_from_row,
      )
      .optional()?,
  )
}

/// Resolve a competency by exact name, creating it at the end of the
/// display order when missing. Returns the competency and whether it was
/// created here.
pub fn resolve_competency(conn: &Connection, name: &str) -> Result<(Competency, bool)> {
  if let Some(existing) = find_competency(conn, name)? {
    return Ok((existing, false));
  }

  let created = insert_if_missing(
    conn,
    "INSERT INTO competencies (name, display_order)
     VALUES (?1, (SELECT COALESCE(MAX(display_order) + 1, 0) FROM competencies))",
    params![name],
  )?;
  if !created {
    warn!(competency = name, "competency created concurrently; reusing it");
  }

  let competency = find_competency(conn, name)?
    .ok_or_else(|| CoreError::ConstraintViolation(format!("competency {name:?} vanished")))?;
  if created {
    debug!(competency = name, order = competency.display_order, "created competency");
  }
  Ok((competency, created))
}

pub fn list_competencies(conn: &Connection) -> Result<Vec<Competency>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {COMPETENCY_COLUMNS} FROM competencies c ORDER BY c.display_order, c.name"
  ))?;
  Ok(
    stmt
      .query_map([], competency_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?,
  )
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// Insert one score fact; an identical fact already present is left alone.
/// Returns whether a row was written.
pub fn insert_score(
  conn: &Connection,
  employee_id: i64,
  dataset_id: i64,
  competency_id: i64,
  raw_value: &str,
  numeric_value: Option<f64>,
  now: DateTime<Utc>,
) -> Result<bool> {
  let inserted = insert_if_missing(
    conn,
    "INSERT INTO scores (
       employee_id, dataset_id, competency_id, raw_value, numeric_value, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      employee_id,
      dataset_id,
      competency_id,
      raw_value,
      numeric_value,
      encode_dt(now)
    ],
  )?;
  if !inserted {
    debug!(employee_id, dataset_id, competency_id, raw_value, "score already present");
  }
  Ok(inserted)
}

/// Outcome of [`rate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rated {
  Inserted,
  /// The raw value changed.
  Replaced,
  /// Same raw value; only the numeric value was refreshed.
  Unchanged,
}

/// Make `raw_value` the one rating of `(employee, dataset, competency)`.
///
/// Extra rows for the same triple (left by merges) are removed so the
/// rating ends up unique.
pub fn rate(
  conn: &Connection,
  employee_id: i64,
  dataset_id: i64,
  competency_id: i64,
  raw_value: &str,
  numeric_value: Option<f64>,
  now: DateTime<Utc>,
) -> Result<Rated> {
  let existing: Vec<(i64, String)> = {
    let mut stmt = conn.prepare(
      "SELECT id, raw_value FROM scores
       WHERE employee_id = ?1 AND dataset_id = ?2 AND competency_id = ?3
       ORDER BY id",
    )?;
    stmt
      .query_map(params![employee_id, dataset_id, competency_id], |r| {
        Ok((r.get(0)?, r.get(1)?))
      })?
      .collect::<rusqlite::Result<_>>()?
  };

  let Some(((keep, current), extra)) = existing.split_first() else {
    conn.execute(
      "INSERT INTO scores (
         employee_id, dataset_id, competency_id, raw_value, numeric_value, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        employee_id,
        dataset_id,
        competency_id,
        raw_value,
        numeric_value,
        encode_dt(now)
      ],
    )?;
    return Ok(Rated::Inserted);
  };

  for (id, _) in extra {
    conn.execute("DELETE FROM scores WHERE id = ?1", params![id])?;
  }
  conn.execute(
    "UPDATE scores SET raw_value = ?1, numeric_value = ?2 WHERE id = ?3",
    params![raw_value, numeric_value, keep],
  )?;

  if current == raw_value && extra.is_empty() {
    Ok(Rated::Unchanged)
  } else {
    debug!(
      employee_id,
      dataset_id,
      competency_id,
      from = %current,
      to = raw_value,
      "score re-rated"
    );
    Ok(Rated::Replaced)
  }
}

pub fn set_score_value(conn: &Connection, id: i64, numeric_value: Option<f64>) -> Result<()> {
  conn.execute(
    "UPDATE scores SET numeric_value = ?1 WHERE id = ?2",
    params![numeric_value, id],
  )?;
  Ok(())
}

fn collect_scores(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Score>> {
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, RawScore::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawScore::into_score)
    .collect()
}

pub fn dataset_scores(conn: &Connection, dataset_id: i64) -> Result<Vec<Score>> {
  collect_scores(
    conn,
    &format!("SELECT {SCORE_COLUMNS} FROM scores s WHERE s.dataset_id = ?1 ORDER BY s.id"),
    params![dataset_id],
  )
}

/// Every score attached to a dataset.
pub fn all_scores(conn: &Connection) -> Result<Vec<Score>> {
  collect_scores(
    conn,
    &format!(
      "SELECT {SCORE_COLUMNS} FROM scores s WHERE s.dataset_id IS NOT NULL ORDER BY s.id"
    ),
    [],
  )
}

/// One employee's scores in one dataset, joined with their competencies.
pub fn employee_scores(
  conn: &Connection,
  dataset_id: i64,
  employee_id: i64,
) -> Result<Vec<ScoreWithCompetency>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SCORE_COLUMNS}, {COMPETENCY_COLUMNS}
     FROM scores s JOIN competencies c ON c.id = s.competency_id
     WHERE s.dataset_id = ?1 AND s.employee_id = ?2
     ORDER BY c.display_order, c.name"
  ))?;
  let rows = stmt
    .query_map(params![dataset_id, employee_id], |row| {
      Ok((RawScore::from_row(row)?, competency_at(row, 7)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(raw, competency)| {
      Ok(ScoreWithCompetency { score: raw.into_score()?, competency })
    })
    .collect()
}

// ─── Rating mappings ─────────────────────────────────────────────────────────

/// Insert a mapping unless the dataset already maps the same text
/// (case-insensitively). Returns whether a row was written.
pub fn insert_mapping_if_missing(
  conn: &Connection,
  dataset_id: i64,
  text_value: &str,
  numeric_value: f64,
) -> Result<bool> {
  let inserted = insert_if_missing(
    conn,
    "INSERT INTO rating_mappings (dataset_id, text_value, numeric_value)
     VALUES (?1, ?2, ?3)",
    params![dataset_id, text_value, numeric_value],
  )?;
  if !inserted {
    debug!(dataset_id, text_value, "rating mapping already present");
  }
  Ok(inserted)
}

/// Insert a mapping, or overwrite the numeric value of the one that already
/// maps the same text.
pub fn upsert_mapping(
  conn: &Connection,
  dataset_id: i64,
  text_value: &str,
  numeric_value: f64,
) -> Result<()> {
  if !insert_mapping_if_missing(conn, dataset_id, text_value, numeric_value)? {
    conn.execute(
      "UPDATE rating_mappings SET numeric_value = ?1
       WHERE dataset_id = ?2 AND lower(trim(text_value)) = lower(trim(?3))",
      params![numeric_value, dataset_id, text_value],
    )?;
  }
  Ok(())
}

pub fn dataset_mappings(conn: &Connection, dataset_id: i64) -> Result<Vec<RatingMapping>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MAPPING_COLUMNS} FROM rating_mappings m WHERE m.dataset_id = ?1 ORDER BY m.id"
  ))?;
  Ok(
    stmt
      .query_map(params![dataset_id], mapping_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?,
  )
}

// ─── Summaries ───────────────────────────────────────────────────────────────

pub fn get_summary(conn: &Connection, employee_id: i64) -> Result<Option<Summary>> {
  conn
    .query_row(
      &format!("SELECT {SUMMARY_COLUMNS} FROM summaries sm WHERE sm.employee_id = ?1"),
      params![employee_id],
      RawSummary::from_row,
    )
    .optional()?
    .map(RawSummary::into_summary)
    .transpose()
}

pub fn upsert_summary(
  conn: &Connection,
  employee_id: i64,
  content: &str,
  now: DateTime<Utc>,
) -> Result<Summary> {
  conn.execute(
    "INSERT INTO summaries (employee_id, content, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?3)
     ON CONFLICT (employee_id) DO UPDATE
     SET content = excluded.content, updated_at = excluded.updated_at",
    params![employee_id, content, encode_dt(now)],
  )?;
  get_summary(conn, employee_id)?.ok_or_else(|| {
    CoreError::not_found(Entity::Summary, employee_id).into()
  })
}
