//! SQL schema for the performance store, one DDL block per version.
//!
//! Only [`crate::migrate`] executes these; ordinary repository code never
//! alters tables or indexes.

/// Version 1: per-dataset employees, scores without a dataset reference.
pub const V1_BASE: &str = "
CREATE TABLE datasets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    source_file TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Every employee row belongs to exactly one dataset.
CREATE TABLE employees (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id  INTEGER NOT NULL REFERENCES datasets(id),
    name        TEXT NOT NULL,
    nip         TEXT,
    gol         TEXT,
    jabatan     TEXT,
    sub_jabatan TEXT,
    created_at  TEXT
);

CREATE TABLE competencies (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL UNIQUE,
    description   TEXT,
    display_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE scores (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id   INTEGER NOT NULL REFERENCES employees(id),
    competency_id INTEGER NOT NULL REFERENCES competencies(id),
    raw_value     TEXT NOT NULL,
    numeric_value REAL,
    created_at    TEXT NOT NULL
);

CREATE TABLE rating_mappings (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id    INTEGER NOT NULL REFERENCES datasets(id),
    text_value    TEXT NOT NULL,
    numeric_value REAL NOT NULL,
    UNIQUE (dataset_id, text_value)
);

CREATE TABLE summaries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id INTEGER NOT NULL UNIQUE REFERENCES employees(id),
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

/// Version 2, first half: the global employee table, filled by the
/// migration before the legacy table is swapped out.
pub const V2_EMPLOYEES: &str = "
CREATE TABLE employees_global (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    name_key    TEXT NOT NULL,   -- normalized identity key; not unique
    nip         TEXT,
    gol         TEXT,
    jabatan     TEXT,
    sub_jabatan TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

/// Version 2, second half: swap tables, add links and the score dataset
/// reference.
pub const V2_LINKS: &str = "
DROP TABLE employees;
ALTER TABLE employees_global RENAME TO employees;

CREATE TABLE dataset_employees (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id  INTEGER NOT NULL REFERENCES datasets(id),
    employee_id INTEGER NOT NULL REFERENCES employees(id),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (dataset_id, employee_id)
);

ALTER TABLE scores ADD COLUMN dataset_id INTEGER REFERENCES datasets(id);

CREATE INDEX employees_name_key_idx         ON employees(name_key);
CREATE INDEX dataset_employees_employee_idx ON dataset_employees(employee_id);
CREATE INDEX scores_employee_idx            ON scores(employee_id);
CREATE INDEX scores_dataset_idx             ON scores(dataset_id);
CREATE INDEX scores_competency_idx          ON scores(competency_id);
CREATE INDEX rating_mappings_dataset_idx    ON rating_mappings(dataset_id);
";

/// Version 3: collapse duplicate facts, then make them impossible.
pub const V3_UNIQUE_FACTS: &str = "
DELETE FROM scores WHERE id NOT IN (
    SELECT MIN(id) FROM scores
    GROUP BY employee_id, dataset_id, competency_id, raw_value
);

DELETE FROM rating_mappings WHERE id NOT IN (
    SELECT MIN(id) FROM rating_mappings
    GROUP BY dataset_id, lower(trim(text_value))
);

CREATE UNIQUE INDEX scores_fact_uq
    ON scores(employee_id, dataset_id, competency_id, raw_value);
CREATE UNIQUE INDEX rating_mappings_text_uq
    ON rating_mappings(dataset_id, lower(trim(text_value)));
";
