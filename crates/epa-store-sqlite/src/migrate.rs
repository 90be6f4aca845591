//! Schema versioning.
//!
//! The on-disk version lives in `PRAGMA user_version`. Opening a store runs
//! every step between that version and the target inside one exclusive
//! transaction; any failure rolls the whole upgrade back and the file keeps
//! its old shape.
//!
//! The step that introduces global employees is split into a pure planner,
//! [`plan_link_model`], over snapshots of the legacy rows, and a thin layer
//! that reads the snapshots and writes the plan.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use epa_core::{Error as CoreError, identity::normalize};
use rusqlite::{
  Connection, OptionalExtension as _, Transaction, TransactionBehavior, params,
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  encode::{decode_dt, encode_dt},
  schema,
};

struct Migration {
  version: u32,
  name:    &'static str,
  apply:   fn(&Transaction<'_>) -> Result<()>,
}

const MIGRATIONS: [Migration; 3] = [
  Migration { version: 1, name: "base schema", apply: base_schema },
  Migration { version: 2, name: "global employees", apply: link_model },
  Migration { version: 3, name: "unique facts", apply: unique_facts },
];

/// The schema version this build writes.
pub const LATEST_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn user_version(conn: &Connection) -> Result<u32> {
  Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Bring the schema to `target`, returning the version now on disk.
///
/// Fails with [`Error::Upgrade`] when the file is newer than `target`, when
/// `target` is unknown, or when any step fails.
pub fn upgrade(conn: &mut Connection, target: u32) -> Result<u32> {
  let current = user_version(conn)?;
  let refuse = |reason: String| Error::Upgrade { from: current, to: target, reason };

  if target > LATEST_VERSION {
    return Err(refuse(format!("unknown schema version {target}")));
  }
  if current > target {
    return Err(refuse("store was written by a newer version".to_owned()));
  }
  if current == target {
    debug!(version = current, "schema up to date");
    return Ok(current);
  }

  run_steps(conn, current, target).map_err(|e| refuse(e.to_string()))?;
  Ok(target)
}

fn run_steps(conn: &mut Connection, current: u32, target: u32) -> Result<()> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
  for step in MIGRATIONS
    .iter()
    .filter(|m| m.version > current && m.version <= target)
  {
    info!(
      from = step.version - 1,
      to = step.version,
      step = step.name,
      "migrating schema"
    );
    (step.apply)(&tx)?;
  }
  check_foreign_keys(&tx)?;
  tx.pragma_update(None, "user_version", target)?;
  tx.commit()?;
  Ok(())
}

/// Foreign keys are off while steps run; refuse to commit a schema whose
/// rows no longer satisfy them.
fn check_foreign_keys(tx: &Transaction<'_>) -> Result<()> {
  let violations: Vec<(String, Option<i64>, String)> = {
    let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
    stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
      .collect::<rusqlite::Result<_>>()?
  };
  match violations.first() {
    None => Ok(()),
    Some((table, rowid, parent)) => Err(
      CoreError::ConstraintViolation(format!(
        "{} row(s) violate foreign keys, first {table} row {} -> {parent}",
        violations.len(),
        rowid.map_or_else(|| "?".to_owned(), |id| id.to_string())
      ))
      .into(),
    ),
  }
}

// ─── Steps ───────────────────────────────────────────────────────────────────

fn base_schema(tx: &Transaction<'_>) -> Result<()> {
  tx.execute_batch(schema::V1_BASE)?;
  Ok(())
}

fn unique_facts(tx: &Transaction<'_>) -> Result<()> {
  tx.execute_batch(schema::V3_UNIQUE_FACTS)?;
  Ok(())
}

fn link_model(tx: &Transaction<'_>) -> Result<()> {
  let employees: Vec<LegacyEmployee> = {
    let mut stmt = tx.prepare(
      "SELECT id, dataset_id, name, nip, gol, jabatan, sub_jabatan, created_at
       FROM employees ORDER BY id",
    )?;
    stmt
      .query_map([], |row| {
        Ok(LegacyEmployee {
          id:          row.get(0)?,
          dataset_id:  row.get(1)?,
          name:        row.get(2)?,
          nip:         row.get(3)?,
          gol:         row.get(4)?,
          jabatan:     row.get(5)?,
          sub_jabatan: row.get(6)?,
          created_at:  row.get(7)?,
        })
      })?
      .collect::<rusqlite::Result<_>>()?
  };

  let scores: Vec<LegacyScore> = {
    let mut stmt = tx.prepare("SELECT id, employee_id FROM scores ORDER BY id")?;
    stmt
      .query_map([], |row| {
        Ok(LegacyScore { id: row.get(0)?, employee_id: row.get(1)? })
      })?
      .collect::<rusqlite::Result<_>>()?
  };

  let plan = plan_link_model(employees, &scores, Utc::now());

  tx.execute_batch(schema::V2_EMPLOYEES)?;
  for e in &plan.employees {
    tx.execute(
      "INSERT INTO employees_global (
         id, name, name_key, nip, gol, jabatan, sub_jabatan, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      params![
        e.id,
        e.name,
        e.name_key,
        e.nip,
        e.gol,
        e.jabatan,
        e.sub_jabatan,
        e.created_at,
        e.updated_at,
      ],
    )?;
  }

  tx.execute_batch(schema::V2_LINKS)?;
  for link in &plan.links {
    tx.execute(
      "INSERT INTO dataset_employees (dataset_id, employee_id, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?3)",
      params![link.dataset_id, link.employee_id, link.stamped_at],
    )?;
  }

  let mut backfilled = 0usize;
  for fill in &plan.backfills {
    let dataset_id = match fill.dataset_id {
      Some(id) => Some(id),
      None => tx
        .query_row(
          "SELECT dataset_id FROM dataset_employees
           WHERE employee_id = ?1 ORDER BY id LIMIT 1",
          params![fill.employee_id],
          |r| r.get::<_, i64>(0),
        )
        .optional()?,
    };
    match dataset_id {
      Some(dataset_id) => {
        tx.execute(
          "UPDATE scores SET dataset_id = ?1 WHERE id = ?2",
          params![dataset_id, fill.score_id],
        )?;
        backfilled += 1;
      }
      None => warn!(
        score_id = fill.score_id,
        employee_id = fill.employee_id,
        "legacy score has no dataset to attach to"
      ),
    }
  }

  info!(
    employees = plan.employees.len(),
    links = plan.links.len(),
    scores = backfilled,
    "moved employees to the global master list"
  );
  Ok(())
}

// ─── Link-model planner ──────────────────────────────────────────────────────

/// An employee row as stored before employees became global.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEmployee {
  pub id:          i64,
  pub dataset_id:  i64,
  pub name:        String,
  pub nip:         Option<String>,
  pub gol:         Option<String>,
  pub jabatan:     Option<String>,
  pub sub_jabatan: Option<String>,
  pub created_at:  Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyScore {
  pub id:          i64,
  pub employee_id: i64,
}

/// A global employee row, keeping the legacy id.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEmployee {
  pub id:          i64,
  pub name:        String,
  pub name_key:    String,
  pub nip:         Option<String>,
  pub gol:         Option<String>,
  pub jabatan:     Option<String>,
  pub sub_jabatan: Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLink {
  pub dataset_id:  i64,
  pub employee_id: i64,
  pub stamped_at:  String,
}

/// The dataset a legacy score belongs to; `None` when the employee map has
/// no entry and the link table must be consulted instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBackfill {
  pub score_id:    i64,
  pub employee_id: i64,
  pub dataset_id:  Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkModelPlan {
  pub employees: Vec<PlannedEmployee>,
  pub links:     Vec<PlannedLink>,
  pub backfills: Vec<ScoreBackfill>,
}

/// Plan the move from per-dataset employees to global employees plus links.
///
/// Each legacy employee keeps its id, loses its dataset column, gains a
/// name key and timestamps, and yields exactly one link to its old dataset.
/// Unparseable or missing creation times are stamped with `now`.
pub fn plan_link_model(
  employees: Vec<LegacyEmployee>,
  scores: &[LegacyScore],
  now: DateTime<Utc>,
) -> LinkModelPlan {
  let stamp = encode_dt(now);
  let mut dataset_of: HashMap<i64, i64> = HashMap::new();
  let mut plan = LinkModelPlan::default();

  for legacy in employees {
    let created_at = legacy
      .created_at
      .as_deref()
      .and_then(|s| decode_dt(s).ok())
      .map_or_else(|| stamp.clone(), encode_dt);

    dataset_of.insert(legacy.id, legacy.dataset_id);
    plan.links.push(PlannedLink {
      dataset_id:  legacy.dataset_id,
      employee_id: legacy.id,
      stamped_at:  stamp.clone(),
    });
    plan.employees.push(PlannedEmployee {
      id: legacy.id,
      name_key: normalize(&legacy.name),
      name: legacy.name,
      nip: legacy.nip,
      gol: legacy.gol,
      jabatan: legacy.jabatan,
      sub_jabatan: legacy.sub_jabatan,
      created_at,
      updated_at: stamp.clone(),
    });
  }

  plan.backfills = scores
    .iter()
    .map(|s| ScoreBackfill {
      score_id:    s.id,
      employee_id: s.employee_id,
      dataset_id:  dataset_of.get(&s.employee_id).copied(),
    })
    .collect();

  plan
}
