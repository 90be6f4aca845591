//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are written as RFC 3339 UTC strings with microsecond precision
//! so they sort lexically. Rows written by older versions of the schema may
//! carry SQLite's `YYYY-MM-DD HH:MM:SS` format instead; both are accepted.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use epa_core::model::{
  Competency, Dataset, DatasetEmployeeLink, Employee, RatingMapping, Score,
  Summary,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const DATASET_COLUMNS: &str =
  "d.id, d.name, d.description, d.source_file, d.created_at, d.updated_at";

pub const EMPLOYEE_COLUMNS: &str = "e.id, e.name, e.nip, e.gol, e.jabatan, \
                                    e.sub_jabatan, e.created_at, e.updated_at";

pub const COMPETENCY_COLUMNS: &str =
  "c.id, c.name, c.description, c.display_order";

pub const SCORE_COLUMNS: &str = "s.id, s.employee_id, s.dataset_id, \
                                 s.competency_id, s.raw_value, \
                                 s.numeric_value, s.created_at";

pub const LINK_COLUMNS: &str =
  "l.id, l.dataset_id, l.employee_id, l.created_at, l.updated_at";

pub const MAPPING_COLUMNS: &str =
  "m.id, m.dataset_id, m.text_value, m.numeric_value";

pub const SUMMARY_COLUMNS: &str =
  "sm.id, sm.employee_id, sm.content, sm.created_at, sm.updated_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `datasets` row.
pub struct RawDataset {
  pub id:          i64,
  pub name:        String,
  pub description: Option<String>,
  pub source_file: Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawDataset {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      source_file: row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_dataset(self) -> Result<Dataset> {
    Ok(Dataset {
      id:          self.id,
      name:        self.name,
      description: self.description,
      source_file: self.source_file,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawEmployee {
  pub id:          i64,
  pub name:        String,
  pub nip:         Option<String>,
  pub gol:         Option<String>,
  pub jabatan:     Option<String>,
  pub sub_jabatan: Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawEmployee {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      nip:         row.get(2)?,
      gol:         row.get(3)?,
      jabatan:     row.get(4)?,
      sub_jabatan: row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_employee(self) -> Result<Employee> {
    Ok(Employee {
      id:          self.id,
      name:        self.name,
      nip:         self.nip,
      gol:         self.gol,
      jabatan:     self.jabatan,
      sub_jabatan: self.sub_jabatan,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub fn competency_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Competency> {
  competency_at(row, 0)
}

/// Read a competency whose columns start at `offset`.
pub fn competency_at(
  row: &rusqlite::Row<'_>,
  offset: usize,
) -> rusqlite::Result<Competency> {
  Ok(Competency {
    id:            row.get(offset)?,
    name:          row.get(offset + 1)?,
    description:   row.get(offset + 2)?,
    display_order: row.get(offset + 3)?,
  })
}

pub struct RawScore {
  pub id:            i64,
  pub employee_id:   i64,
  pub dataset_id:    i64,
  pub competency_id: i64,
  pub raw_value:     String,
  pub numeric_value: Option<f64>,
  pub created_at:    String,
}

impl RawScore {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      employee_id:   row.get(1)?,
      dataset_id:    row.get(2)?,
      competency_id: row.get(3)?,
      raw_value:     row.get(4)?,
      numeric_value: row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_score(self) -> Result<Score> {
    Ok(Score {
      id:            self.id,
      employee_id:   self.employee_id,
      dataset_id:    self.dataset_id,
      competency_id: self.competency_id,
      raw_value:     self.raw_value,
      numeric_value: self.numeric_value,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawLink {
  pub id:          i64,
  pub dataset_id:  i64,
  pub employee_id: i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawLink {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      dataset_id:  row.get(1)?,
      employee_id: row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_link(self) -> Result<DatasetEmployeeLink> {
    Ok(DatasetEmployeeLink {
      id:          self.id,
      dataset_id:  self.dataset_id,
      employee_id: self.employee_id,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub fn mapping_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RatingMapping> {
  Ok(RatingMapping {
    id:            row.get(0)?,
    dataset_id:    row.get(1)?,
    text_value:    row.get(2)?,
    numeric_value: row.get(3)?,
  })
}

pub struct RawSummary {
  pub id:          i64,
  pub employee_id: i64,
  pub content:     String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawSummary {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      employee_id: row.get(1)?,
      content:     row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_summary(self) -> Result<Summary> {
    Ok(Summary {
      id:          self.id,
      employee_id: self.employee_id,
      content:     self.content,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}
