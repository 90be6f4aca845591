//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use epa_core::{
  Classify, Error as CoreError, ErrorKind,
  import::{MergeRequest, PerformanceAppend, PerformanceImport},
  model::{EmployeeRow, EmployeeUpdate, NewDataset, RatingRow, ScoreRow},
  store::{EmployeeQuery, EmployeeSortField, PerformanceStore, SortDirection},
};
use rusqlite::params;

use crate::{Error, LATEST_VERSION, SqliteStore, StoreManager, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn kind<T: std::fmt::Debug>(result: Result<T, Error>) -> ErrorKind {
  result.expect_err("operation should fail").kind()
}

async fn seed(s: &SqliteStore, names: &[&str]) {
  let rows = names.iter().map(|n| EmployeeRow::named(*n)).collect();
  s.import_employees(rows).await.unwrap();
}

fn performance(
  name: &str,
  employees: &[&str],
  scores: &[(&str, &str, &str)],
  ratings: &[(&str, f64)],
) -> PerformanceImport {
  PerformanceImport {
    dataset_name:        name.into(),
    dataset_description: None,
    source_file:         Some(format!("{name}.csv")),
    employee_names:      employees.iter().map(|n| (*n).to_owned()).collect(),
    scores:              scores
      .iter()
      .map(|(e, c, v)| ScoreRow::new(*e, *c, *v))
      .collect(),
    rating_mappings:     ratings
      .iter()
      .map(|(t, v)| RatingRow::new(*t, *v))
      .collect(),
  }
}

async fn count(s: &SqliteStore, sql: &'static str, id: i64) -> i64 {
  s.with_conn(move |conn| Ok(conn.query_row(sql, params![id], |r| r.get(0))?))
    .await
    .unwrap()
}

// ─── Datasets ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_get_and_list_datasets() {
  let s = store().await;

  let first = s.create_dataset(NewDataset::named("  Semester 1 ")).await.unwrap();
  let second = s
    .create_dataset(NewDataset {
      name:        "Semester 2".into(),
      description: Some("   ".into()),
      source_file: Some("s2.csv".into()),
    })
    .await
    .unwrap();

  assert_eq!(first.name, "Semester 1");
  assert_eq!(second.description, None);
  assert_eq!(s.get_dataset(first.id).await.unwrap(), first);

  let listed: Vec<i64> =
    s.list_datasets().await.unwrap().iter().map(|d| d.id).collect();
  assert_eq!(listed, vec![second.id, first.id]);
}

#[tokio::test]
async fn blank_dataset_name_is_invalid() {
  let s = store().await;
  assert_eq!(
    kind(s.create_dataset(NewDataset::named("  ")).await),
    ErrorKind::InvalidInput
  );
}

#[tokio::test]
async fn missing_dataset_is_not_found() {
  let s = store().await;
  assert_eq!(kind(s.get_dataset(42).await), ErrorKind::NotFound);
  assert_eq!(kind(s.delete_dataset(42).await), ErrorKind::NotFound);
  assert_eq!(
    kind(s.update_dataset(42, "X".into(), None).await),
    ErrorKind::NotFound
  );
}

#[tokio::test]
async fn update_dataset_trims_and_clears_description() {
  let s = store().await;
  let dataset = s
    .create_dataset(NewDataset {
      name:        "Old".into(),
      description: Some("notes".into()),
      source_file: None,
    })
    .await
    .unwrap();

  let updated = s
    .update_dataset(dataset.id, " New ".into(), Some(" ".into()))
    .await
    .unwrap();
  assert_eq!(updated.name, "New");
  assert_eq!(updated.description, None);
  assert!(updated.updated_at >= dataset.updated_at);

  assert_eq!(
    kind(s.update_dataset(dataset.id, "".into(), None).await),
    ErrorKind::InvalidInput
  );
}

#[tokio::test]
async fn deleting_a_dataset_removes_its_links_scores_and_mappings() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let imported = s
    .import_performance_dataset(performance(
      "D",
      &["Ana"],
      &[("Ana", "Integritas", "Baik")],
      &[("Baik", 4.0)],
    ))
    .await
    .unwrap();
  let id = imported.dataset.id;

  s.delete_dataset(id).await.unwrap();

  assert_eq!(kind(s.get_dataset(id).await), ErrorKind::NotFound);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM scores WHERE dataset_id = ?1", id).await, 0);
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM dataset_employees WHERE dataset_id = ?1", id).await,
    0
  );
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM rating_mappings WHERE dataset_id = ?1", id).await,
    0
  );
  assert_eq!(s.list_all_employees().await.unwrap().len(), 1);
}

// ─── Employees ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn reimporting_an_employee_updates_instead_of_duplicating() {
  let s = store().await;
  let row = EmployeeRow { nip: Some("1987".into()), ..EmployeeRow::named("Ana Putri") };

  let first = s.import_employees(vec![row.clone()]).await.unwrap();
  assert_eq!((first.inserted, first.updated, first.total), (1, 0, 1));

  let second = s.import_employees(vec![row]).await.unwrap();
  assert_eq!((second.inserted, second.updated, second.total), (0, 1, 1));

  assert_eq!(s.list_all_employees().await.unwrap().len(), 1);
}

#[tokio::test]
async fn import_collapses_spelling_variants_and_keeps_existing_fields() {
  let s = store().await;
  s.import_employees(vec![EmployeeRow {
    nip: Some("111".into()),
    ..EmployeeRow::named("José Ramírez")
  }])
  .await
  .unwrap();

  let result = s
    .import_employees(vec![
      EmployeeRow { nip: Some("999".into()), ..EmployeeRow::named("jose ramirez") },
      EmployeeRow { gol: Some("III/b".into()), ..EmployeeRow::named("JOSE  RAMIREZ") },
    ])
    .await
    .unwrap();
  assert_eq!((result.inserted, result.updated, result.total), (0, 1, 1));

  let all = s.list_all_employees().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].name, "José Ramírez");
  assert_eq!(all[0].nip.as_deref(), Some("111"));
  assert_eq!(all[0].gol.as_deref(), Some("III/b"));
}

#[tokio::test]
async fn blank_employee_name_fails_the_batch() {
  let s = store().await;
  let err = s
    .import_employees(vec![EmployeeRow::named("Ana"), EmployeeRow::named(" ")])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::BlankName { row: 1 })));
  assert!(s.list_all_employees().await.unwrap().is_empty());
}

#[tokio::test]
async fn master_list_is_sorted_case_insensitively() {
  let s = store().await;
  seed(&s, &["budi", "Ana", "Citra"]).await;
  let names: Vec<String> =
    s.list_all_employees().await.unwrap().into_iter().map(|e| e.name).collect();
  assert_eq!(names, vec!["Ana", "budi", "Citra"]);
}

#[tokio::test]
async fn appending_employees_links_them_once() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let dataset = s.create_dataset(NewDataset::named("D")).await.unwrap();

  let rows = vec![EmployeeRow::named("ana"), EmployeeRow::named("Budi")];
  let first = s.append_dataset_employees(dataset.id, rows.clone()).await.unwrap();
  assert_eq!((first.created, first.updated, first.linked), (1, 1, 2));

  let again = s.append_dataset_employees(dataset.id, rows).await.unwrap();
  assert_eq!((again.created, again.updated, again.linked), (0, 2, 0));

  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM dataset_employees WHERE dataset_id = ?1", dataset.id)
      .await,
    2
  );
  assert!(s.get_dataset(dataset.id).await.unwrap().updated_at >= dataset.updated_at);
  assert_eq!(
    kind(s.append_dataset_employees(99, vec![EmployeeRow::named("X")]).await),
    ErrorKind::NotFound
  );
}

#[tokio::test]
async fn bulk_update_applies_tri_state_fields() {
  let s = store().await;
  s.import_employees(vec![EmployeeRow {
    nip: Some("1".into()),
    gol: Some("III/a".into()),
    jabatan: Some("Analis".into()),
    ..EmployeeRow::named("Ana")
  }])
  .await
  .unwrap();
  let ana = s.list_all_employees().await.unwrap().remove(0);

  let updated = s
    .bulk_update_employees(vec![
      EmployeeUpdate {
        id: ana.id,
        name: Some(" Ana Maria ".into()),
        nip: Some(None),
        gol: Some(Some("IV/a".into())),
        ..Default::default()
      },
      EmployeeUpdate { id: 999, name: Some("Ghost".into()), ..Default::default() },
      EmployeeUpdate { id: ana.id, ..Default::default() },
    ])
    .await
    .unwrap();
  assert_eq!(updated, 1);

  let after = s.list_all_employees().await.unwrap().remove(0);
  assert_eq!(after.name, "Ana Maria");
  assert_eq!(after.nip, None);
  assert_eq!(after.gol.as_deref(), Some("IV/a"));
  assert_eq!(after.jabatan.as_deref(), Some("Analis"));

  // The recomputed key is what later imports match against.
  let result = s.import_employees(vec![EmployeeRow::named("ana maria")]).await.unwrap();
  assert_eq!(result.updated, 1);
}

#[tokio::test]
async fn bulk_update_rejects_blank_names() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let ana = s.list_all_employees().await.unwrap().remove(0);
  let err = s
    .bulk_update_employees(vec![EmployeeUpdate {
      id: ana.id,
      name: Some("  ".into()),
      ..Default::default()
    }])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidInput);
  assert_eq!(s.list_all_employees().await.unwrap()[0].name, "Ana");
}

#[tokio::test]
async fn bulk_update_rejects_names_without_letters() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let ana = s.list_all_employees().await.unwrap().remove(0);
  let result = s
    .bulk_update_employees(vec![EmployeeUpdate {
      id: ana.id,
      name: Some("123".into()),
      ..Default::default()
    }])
    .await;
  assert_eq!(kind(result), ErrorKind::InvalidInput);

  let ana = s.list_all_employees().await.unwrap().remove(0);
  assert_eq!(ana.name, "Ana");
  assert_eq!(
    s.with_conn(move |conn| {
      Ok(conn.query_row(
        "SELECT name_key FROM employees WHERE id = ?1",
        params![ana.id],
        |r| r.get::<_, String>(0),
      )?)
    })
    .await
    .unwrap(),
    "ana"
  );
}

#[tokio::test]
async fn bulk_delete_removes_scores_links_and_summary() {
  let s = store().await;
  seed(&s, &["Ana", "Budi"]).await;
  let imported = s
    .import_performance_dataset(performance(
      "D",
      &["Ana", "Budi"],
      &[("Ana", "Integritas", "4"), ("Budi", "Integritas", "3")],
      &[],
    ))
    .await
    .unwrap();
  let all = s.list_all_employees().await.unwrap();
  let ana = all.iter().find(|e| e.name == "Ana").unwrap().id;
  s.save_employee_summary(ana, "draft".into()).await.unwrap();

  let deleted = s.bulk_delete_employees(vec![ana, 12345]).await.unwrap();
  assert_eq!(deleted, 1);

  assert_eq!(count(&s, "SELECT COUNT(*) FROM scores WHERE employee_id = ?1", ana).await, 0);
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM dataset_employees WHERE employee_id = ?1", ana).await,
    0
  );
  assert_eq!(s.employee_summary(ana).await.unwrap(), None);

  let stats = s.dataset_stats(imported.dataset.id).await.unwrap();
  assert_eq!(stats.total_employees, 1);
}

// ─── Performance import ──────────────────────────────────────────────────────

#[tokio::test]
async fn ratings_resolve_case_insensitively_and_unmapped_stay_null() {
  let s = store().await;
  seed(&s, &["Ana"]).await;

  let result = s
    .import_performance_dataset(performance(
      "D",
      &["Ana"],
      &[("Ana", "Integritas", "baik"), ("Ana", "Disiplin", "Cukup")],
      &[("Baik", 4.0)],
    ))
    .await
    .unwrap();
  assert_eq!(result.employee_count, 1);
  assert_eq!(result.competency_count, 2);
  assert_eq!(result.score_count, 2);
  assert_eq!(result.dataset.source_file.as_deref(), Some("D.csv"));

  let ana = s.list_all_employees().await.unwrap().remove(0);
  let profile = s.employee_performance(result.dataset.id, ana.id).await.unwrap();
  let values: Vec<(&str, Option<f64>)> = profile
    .scores
    .iter()
    .map(|s| (s.competency.name.as_str(), s.score.numeric_value))
    .collect();
  assert_eq!(values, vec![("Integritas", Some(4.0)), ("Disiplin", None)]);
  assert_eq!(profile.scores[0].score.raw_value, "baik");
}

#[tokio::test]
async fn unknown_employee_aborts_before_anything_is_written() {
  let s = store().await;
  seed(&s, &["Ana"]).await;

  let err = s
    .import_performance_dataset(performance(
      "D",
      &["Ana"],
      &[("Ana", "Integritas", "Baik"), ("Zaki", "Integritas", "Baik")],
      &[("Baik", 4.0)],
    ))
    .await
    .unwrap_err();
  assert!(matches!(
    &err,
    Error::Core(CoreError::UnknownEmployee { row: 1, name }) if name == "Zaki"
  ));
  assert_eq!(err.kind(), ErrorKind::InvalidInput);

  assert!(s.list_datasets().await.unwrap().is_empty());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM scores WHERE ?1 = ?1", 0).await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM competencies WHERE ?1 = ?1", 0).await, 0);
}

#[tokio::test]
async fn score_rows_use_normalized_names() {
  let s = store().await;
  seed(&s, &["Dewi Lestari"]).await;

  let result = s
    .import_performance_dataset(performance(
      "D",
      &["Dewi Lestari"],
      &[("DEWI  LESTARI", "Integritas", "4"), ("dewi lestari", "Disiplin", "3")],
      &[("4", 4.0), ("3", 3.0)],
    ))
    .await
    .unwrap();
  assert_eq!(result.employee_count, 1);
  assert_eq!(result.score_count, 2);

  let listing = s
    .list_employees(result.dataset.id, &EmployeeQuery::default())
    .await
    .unwrap();
  assert_eq!(listing.total_count, 1);
  assert_eq!(listing.employees[0].score_count, 2);
  assert_eq!(listing.employees[0].average_score, 3.5);
}

#[tokio::test]
async fn competencies_keep_first_seen_order_across_imports() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  s.import_performance_dataset(performance(
    "A",
    &["Ana"],
    &[("Ana", "Integritas", "1"), ("Ana", "Disiplin", "1")],
    &[],
  ))
  .await
  .unwrap();
  let second = s
    .import_performance_dataset(performance(
      "B",
      &["Ana"],
      &[("Ana", "Kerjasama", "1"), ("Ana", "Integritas", "1")],
      &[],
    ))
    .await
    .unwrap();
  assert_eq!(second.competency_count, 2);

  let names: Vec<(String, i64)> = s
    .with_conn(|conn| {
      let mut stmt =
        conn.prepare("SELECT name, display_order FROM competencies ORDER BY display_order")?;
      let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap();
  assert_eq!(names, vec![
    ("Integritas".to_owned(), 0),
    ("Disiplin".to_owned(), 1),
    ("Kerjasama".to_owned(), 2),
  ]);
}

#[tokio::test]
async fn blank_competency_is_invalid() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let result = s
    .import_performance_dataset(performance("D", &["Ana"], &[("Ana", " ", "4")], &[]))
    .await;
  assert_eq!(kind(result), ErrorKind::InvalidInput);
  assert!(s.list_datasets().await.unwrap().is_empty());
}

#[tokio::test]
async fn append_performance_upserts_mappings_and_skips_unchanged_scores() {
  let s = store().await;
  seed(&s, &["Ana", "Budi"]).await;
  let imported = s
    .import_performance_dataset(performance(
      "D",
      &["Ana"],
      &[("Ana", "Integritas", "Baik")],
      &[("Baik", 3.0), ("Cukup", 2.0)],
    ))
    .await
    .unwrap();
  let id = imported.dataset.id;

  let appended = s
    .append_performance(id, PerformanceAppend {
      employee_names:  vec!["Budi".into()],
      scores:          vec![
        ScoreRow::new("Ana", "Integritas", "Baik"),
        ScoreRow::new("Budi", "Integritas", "baik"),
        ScoreRow::new("Budi", "Disiplin", "Cukup"),
      ],
      rating_mappings: vec![RatingRow::new("BAIK", 4.0)],
    })
    .await
    .unwrap();
  assert_eq!(appended.employee_count, 2);
  assert_eq!(appended.score_count, 2);
  assert_eq!(appended.mapping_count, 1);

  let mappings: Vec<(String, f64)> = s
    .with_conn(move |conn| {
      let mut stmt = conn.prepare(
        "SELECT text_value, numeric_value FROM rating_mappings
         WHERE dataset_id = ?1 ORDER BY id",
      )?;
      let rows = stmt
        .query_map(params![id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap();
  assert_eq!(mappings, vec![("Baik".to_owned(), 4.0), ("Cukup".to_owned(), 2.0)]);

  let budi = s
    .list_all_employees()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.name == "Budi")
    .unwrap();
  let profile = s.employee_performance(id, budi.id).await.unwrap();
  let values: Vec<Option<f64>> =
    profile.scores.iter().map(|s| s.score.numeric_value).collect();
  assert_eq!(values, vec![Some(4.0), Some(2.0)]);

  let ana = s
    .list_all_employees()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.name == "Ana")
    .unwrap();
  let profile = s.employee_performance(id, ana.id).await.unwrap();
  assert_eq!(profile.scores[0].score.numeric_value, Some(4.0));

  assert_eq!(
    kind(s.append_performance(999, PerformanceAppend::default()).await),
    ErrorKind::NotFound
  );
}

#[tokio::test]
async fn appending_a_new_rating_replaces_the_old_one() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let id = s
    .import_performance_dataset(performance(
      "D",
      &["Ana"],
      &[("Ana", "Integritas", "Baik")],
      &[("Baik", 3.0)],
    ))
    .await
    .unwrap()
    .dataset
    .id;
  let ana = s.list_all_employees().await.unwrap().remove(0);

  let appended = s
    .append_performance(id, PerformanceAppend {
      scores: vec![ScoreRow::new("Ana", "Integritas", "Cukup")],
      rating_mappings: vec![RatingRow::new("Cukup", 2.0)],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(appended.score_count, 1);

  let profile = s.employee_performance(id, ana.id).await.unwrap();
  let scores: Vec<(&str, &str, Option<f64>)> = profile
    .scores
    .iter()
    .map(|s| (s.competency.name.as_str(), s.score.raw_value.as_str(), s.score.numeric_value))
    .collect();
  assert_eq!(scores, vec![("Integritas", "Cukup", Some(2.0))]);
  assert_eq!(s.dataset_stats(id).await.unwrap().total_scores, 1);

  // Repeating the same rating writes nothing new.
  let repeated = s
    .append_performance(id, PerformanceAppend {
      scores: vec![ScoreRow::new("Ana", "Integritas", "Cukup")],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(repeated.score_count, 0);
}

#[tokio::test]
async fn remapping_a_rating_updates_stored_scores() {
  let s = store().await;
  seed(&s, &["Ana", "Budi"]).await;
  let id = s
    .import_performance_dataset(performance(
      "D",
      &["Ana", "Budi"],
      &[("Ana", "Integritas", "Baik"), ("Budi", "Integritas", "Cukup")],
      &[("Baik", 3.0)],
    ))
    .await
    .unwrap()
    .dataset
    .id;

  let appended = s
    .append_performance(id, PerformanceAppend {
      rating_mappings: vec![RatingRow::new(" baik", 4.0), RatingRow::new("Cukup", 2.0)],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(appended.score_count, 0);
  assert_eq!(appended.mapping_count, 2);

  let values: Vec<(String, Option<f64>)> = s
    .with_conn(move |conn| {
      let mut stmt = conn.prepare(
        "SELECT raw_value, numeric_value FROM scores WHERE dataset_id = ?1 ORDER BY id",
      )?;
      let rows = stmt
        .query_map(params![id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap();
  assert_eq!(values, vec![
    ("Baik".to_owned(), Some(4.0)),
    ("Cukup".to_owned(), Some(2.0)),
  ]);
  assert_eq!(s.dataset_stats(id).await.unwrap().average_score, 3.0);
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merging_overlapping_datasets_does_not_duplicate() {
  let s = store().await;
  seed(&s, &["Jane Doe", "Budi"]).await;
  let a = s
    .import_performance_dataset(performance(
      "A",
      &["Jane Doe"],
      &[("Jane Doe", "Integrity", "Baik")],
      &[("Baik", 4.0)],
    ))
    .await
    .unwrap();
  let b = s
    .import_performance_dataset(performance(
      "B",
      &["Jane Doe", "Budi"],
      &[("Jane Doe", "Integrity", "Baik"), ("Budi", "Integrity", "Sangat Baik")],
      &[("baik ", 4.0), ("Sangat Baik", 5.0)],
    ))
    .await
    .unwrap();

  let merged = s
    .merge_datasets(MergeRequest {
      source_dataset_ids: vec![a.dataset.id, b.dataset.id, a.dataset.id],
      target_name:        " Gabungan ".into(),
      target_description: None,
    })
    .await
    .unwrap();

  assert_eq!(merged.dataset.name, "Gabungan");
  assert_eq!(merged.source_dataset_ids, vec![a.dataset.id, b.dataset.id]);
  assert_eq!(merged.employee_count, 2);
  assert_eq!(merged.score_count, 2);
  assert_eq!(merged.rating_mapping_count, 2);

  let target = merged.dataset.id;
  let jane = s
    .list_all_employees()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.name == "Jane Doe")
    .unwrap();
  let links: i64 = s
    .with_conn(move |conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM dataset_employees WHERE dataset_id = ?1 AND employee_id = ?2",
        params![target, jane.id],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(links, 1);

  let stats = s.dataset_stats(target).await.unwrap();
  assert_eq!(stats.total_employees, 2);
  assert_eq!(stats.total_scores, 2);
}

#[tokio::test]
async fn merge_validates_its_sources() {
  let s = store().await;
  let a = s.create_dataset(NewDataset::named("A")).await.unwrap();

  let too_few = s
    .merge_datasets(MergeRequest {
      source_dataset_ids: vec![a.id],
      target_name:        "M".into(),
      target_description: None,
    })
    .await;
  assert_eq!(kind(too_few), ErrorKind::InvalidInput);

  let missing = s
    .merge_datasets(MergeRequest {
      source_dataset_ids: vec![a.id, 404],
      target_name:        "M".into(),
      target_description: None,
    })
    .await;
  assert_eq!(kind(missing), ErrorKind::NotFound);
  assert_eq!(s.list_datasets().await.unwrap().len(), 1);
}

// ─── Reads ───────────────────────────────────────────────────────────────────

async fn scored_dataset(s: &SqliteStore) -> i64 {
  s.import_employees(vec![
    EmployeeRow {
      jabatan: Some("Kepala Bidang".into()),
      gol: Some("IV/a".into()),
      ..EmployeeRow::named("Citra")
    },
    EmployeeRow { nip: Some("1987".into()), ..EmployeeRow::named("Ana") },
    EmployeeRow::named("Budi"),
  ])
  .await
  .unwrap();
  s.import_performance_dataset(performance(
    "D",
    &["Ana", "Budi", "Citra"],
    &[
      ("Ana", "Integritas", "4"),
      ("Ana", "Disiplin", "3"),
      ("Budi", "Integritas", "2"),
      ("Citra", "Integritas", "3.5"),
      ("Citra", "Disiplin", "-"),
    ],
    &[("4", 4.0), ("3", 3.0), ("2", 2.0), ("3.5", 3.5)],
  ))
  .await
  .unwrap()
  .dataset
  .id
}

#[tokio::test]
async fn listing_searches_sorts_and_pages() {
  let s = store().await;
  let id = scored_dataset(&s).await;

  let all = s.list_employees(id, &EmployeeQuery::default()).await.unwrap();
  let names: Vec<&str> = all.employees.iter().map(|e| e.employee.name.as_str()).collect();
  assert_eq!(names, vec!["Ana", "Budi", "Citra"]);

  let by_score = s
    .list_employees(id, &EmployeeQuery {
      sort_by: Some(EmployeeSortField::AverageScore),
      direction: Some(SortDirection::Desc),
      limit: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_score.total_count, 3);
  let names: Vec<&str> =
    by_score.employees.iter().map(|e| e.employee.name.as_str()).collect();
  assert_eq!(names, vec!["Ana", "Citra"]);
  assert_eq!(by_score.employees[1].score_count, 1);

  let searched = s
    .list_employees(id, &EmployeeQuery { search: Some("KEPALA".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(searched.total_count, 1);
  assert_eq!(searched.employees[0].employee.name, "Citra");
  assert_eq!(searched.employees[0].position_status.to_string(), "Eselon");

  let paged = s
    .list_employees(id, &EmployeeQuery { offset: Some(2), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(paged.total_count, 3);
  assert_eq!(paged.employees.len(), 1);

  assert_eq!(kind(s.list_employees(77, &EmployeeQuery::default()).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn dataset_stats_count_numeric_scores() {
  let s = store().await;
  let id = scored_dataset(&s).await;
  let stats = s.dataset_stats(id).await.unwrap();

  assert_eq!(stats.total_employees, 3);
  assert_eq!(stats.total_competencies, 2);
  assert_eq!(stats.total_scores, 4);
  assert_eq!(stats.average_score, 3.125);
  let counts: Vec<usize> = stats.score_distribution.iter().map(|b| b.count).collect();
  assert_eq!(counts, vec![0, 0, 1, 2, 1]);

  let integritas = &stats.competency_stats[0];
  assert_eq!(integritas.competency.name, "Integritas");
  assert_eq!(integritas.employee_count, 3);
}

#[tokio::test]
async fn performance_requires_a_link() {
  let s = store().await;
  let id = scored_dataset(&s).await;
  seed(&s, &["Outsider"]).await;
  let outsider = s
    .list_all_employees()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.name == "Outsider")
    .unwrap();

  assert_eq!(kind(s.employee_performance(id, outsider.id).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn comparison_and_dashboard_span_datasets() {
  let s = store().await;
  let base = scored_dataset(&s).await;
  let comparison = s
    .import_performance_dataset(performance(
      "E",
      &["Ana"],
      &[("Ana", "Integritas", "4"), ("Ana", "Kerjasama", "2")],
      &[("4", 4.0), ("2", 2.0)],
    ))
    .await
    .unwrap()
    .dataset
    .id;

  let cmp = s.compare_datasets(base, comparison).await.unwrap();
  let deltas: Vec<(&str, f64)> = cmp
    .competency_deltas
    .iter()
    .map(|d| (d.competency.name.as_str(), d.delta))
    .collect();
  assert_eq!(deltas, vec![("Integritas", 4.0 - 9.5 / 3.0), ("Disiplin", -3.0), (
    "Kerjasama",
    2.0
  )]);
  assert_eq!(cmp.average_delta, 3.0 - 3.125);

  let overview = s.dashboard_overview().await.unwrap();
  assert_eq!(overview.total_datasets, 2);
  assert_eq!(overview.total_employees, 3);
  assert_eq!(overview.total_competencies, 3);
  assert_eq!(overview.total_scores, 6);
  assert_eq!(overview.recent_datasets[0].id, comparison);
  assert_eq!(overview.top_employees[0].name, "Citra");
}

// ─── Summaries ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn summaries_are_upserted_per_employee() {
  let s = store().await;
  seed(&s, &["Ana"]).await;
  let ana = s.list_all_employees().await.unwrap().remove(0);

  assert_eq!(s.employee_summary(ana.id).await.unwrap(), None);
  let first = s.save_employee_summary(ana.id, "one".into()).await.unwrap();
  let second = s.save_employee_summary(ana.id, "two".into()).await.unwrap();
  assert_eq!(first.id, second.id);
  assert_eq!(second.created_at, first.created_at);

  let cached = s.employee_summary(ana.id).await.unwrap().unwrap();
  assert_eq!(cached.content, "two");

  assert_eq!(kind(s.save_employee_summary(999, "x".into()).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn generated_summary_is_not_persisted() {
  let s = store().await;
  let id = scored_dataset(&s).await;
  let ana = s
    .list_all_employees()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.name == "Ana")
    .unwrap();

  let draft = s.generate_employee_summary(id, ana.id).await.unwrap();
  assert!(draft.starts_with("Ana (NIP 1987)"));
  assert_eq!(draft.split("\n\n").count(), 6);
  assert_eq!(s.employee_summary(ana.id).await.unwrap(), None);
}

// ─── Schema lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_is_at_the_latest_version() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), LATEST_VERSION);
}

#[tokio::test]
async fn legacy_employees_gain_links_and_scores_gain_datasets() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("legacy.db");

  let legacy = SqliteStore::open_with(&path, StoreOptions { target_version: 1 })
    .await
    .unwrap();
  assert_eq!(legacy.schema_version().await.unwrap(), 1);
  legacy
    .with_conn(|conn| {
      conn.execute_batch(
        "INSERT INTO datasets (id, name, created_at, updated_at) VALUES
           (1, 'Lama 2022', '2022-01-01 00:00:00', '2022-01-01 00:00:00'),
           (2, 'Lama 2023', '2023-01-01 00:00:00', '2023-01-01 00:00:00');
         INSERT INTO employees (id, dataset_id, name, nip, created_at) VALUES
           (1, 1, 'Ana', '111', '2022-01-02 08:00:00'),
           (2, 2, 'Budi', NULL, NULL),
           (3, 2, 'ana', NULL, '2023-01-02 08:00:00');
         INSERT INTO competencies (id, name, display_order) VALUES (1, 'Integritas', 0);
         INSERT INTO scores (id, employee_id, competency_id, raw_value, numeric_value, created_at)
         VALUES
           (1, 1, 1, 'Baik', 4.0, '2022-01-03 00:00:00'),
           (2, 2, 1, 'Cukup', NULL, '2023-01-03 00:00:00'),
           (3, 3, 1, 'Baik', 4.0, '2023-01-03 00:00:00');
         INSERT INTO summaries (id, employee_id, content, created_at, updated_at)
         VALUES (1, 2, 'Catatan lama', '2023-02-01 00:00:00', '2023-02-01 00:00:00');",
      )?;
      Ok(())
    })
    .await
    .unwrap();
  legacy.close().await.unwrap();

  let upgraded = SqliteStore::open(&path).await.unwrap();
  assert_eq!(upgraded.schema_version().await.unwrap(), LATEST_VERSION);

  let (links, scores) = upgraded
    .with_conn(|conn| {
      let links = conn
        .prepare("SELECT employee_id, dataset_id FROM dataset_employees ORDER BY employee_id")?
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      let scores = conn
        .prepare("SELECT id, dataset_id FROM scores ORDER BY id")?
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok((links, scores))
    })
    .await
    .unwrap();
  assert_eq!(links, vec![(1, 1), (2, 2), (3, 2)]);
  assert_eq!(scores, vec![(1, Some(1)), (2, Some(2)), (3, Some(2))]);

  let employees = upgraded.list_all_employees().await.unwrap();
  assert_eq!(employees.len(), 3);
  assert_eq!(employees[0].nip.as_deref(), Some("111"));

  let stats = upgraded.dataset_stats(2).await.unwrap();
  assert_eq!(stats.total_employees, 2);
  assert_eq!(stats.total_scores, 1);

  let summary = upgraded.employee_summary(2).await.unwrap().unwrap();
  assert_eq!(summary.content, "Catatan lama");

  let foreign_keys: i64 = upgraded
    .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(foreign_keys, 1);
}

#[tokio::test]
async fn failed_upgrade_rolls_back_every_step() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("legacy.db");

  let legacy = SqliteStore::open_with(&path, StoreOptions { target_version: 1 })
    .await
    .unwrap();
  legacy
    .with_conn(|conn| {
      conn.execute_batch(
        "INSERT INTO datasets (id, name, created_at, updated_at)
         VALUES (1, 'Lama', '2022-01-01 00:00:00', '2022-01-01 00:00:00');
         INSERT INTO employees (id, dataset_id, name, created_at)
         VALUES (1, 1, 'Ana', '2022-01-02 08:00:00');
         -- Collides with the link table the v2 step creates.
         CREATE TABLE dataset_employees (id INTEGER PRIMARY KEY);",
      )?;
      Ok(())
    })
    .await
    .unwrap();
  legacy.close().await.unwrap();

  let failed = SqliteStore::open(&path).await;
  assert_eq!(failed.err().map(|e| e.kind()), Some(ErrorKind::UpgradeFailure));

  let raw = rusqlite::Connection::open(&path).unwrap();
  let version: u32 = raw.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
  assert_eq!(version, 1);
  let legacy_row: (i64, String) = raw
    .query_row("SELECT dataset_id, name FROM employees WHERE id = 1", [], |r| {
      Ok((r.get(0)?, r.get(1)?))
    })
    .unwrap();
  assert_eq!(legacy_row, (1, "Ana".to_owned()));
  let half_built: i64 = raw
    .query_row(
      "SELECT COUNT(*) FROM sqlite_master WHERE name = 'employees_global'",
      [],
      |r| r.get(0),
    )
    .unwrap();
  assert_eq!(half_built, 0);
}

#[tokio::test]
async fn upgrade_refuses_dangling_references() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("dangling.db");

  let legacy = SqliteStore::open_with(&path, StoreOptions { target_version: 1 })
    .await
    .unwrap();
  legacy
    .with_conn(|conn| {
      conn.execute_batch(
        "PRAGMA foreign_keys = OFF;
         INSERT INTO competencies (id, name, display_order) VALUES (1, 'Integritas', 0);
         INSERT INTO scores (id, employee_id, competency_id, raw_value, created_at)
         VALUES (1, 42, 1, 'Baik', '2022-01-03 00:00:00');",
      )?;
      Ok(())
    })
    .await
    .unwrap();
  legacy.close().await.unwrap();

  let failed = SqliteStore::open(&path).await;
  assert_eq!(failed.err().map(|e| e.kind()), Some(ErrorKind::UpgradeFailure));

  let raw = rusqlite::Connection::open(&path).unwrap();
  let version: u32 = raw.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
  assert_eq!(version, 1);
  let scores: i64 = raw
    .query_row("SELECT COUNT(*) FROM scores", [], |r| r.get(0))
    .unwrap();
  assert_eq!(scores, 1);
}

#[tokio::test]
async fn newer_schema_on_disk_refuses_to_open() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("future.db");

  let current = SqliteStore::open(&path).await.unwrap();
  current.close().await.unwrap();

  let older = SqliteStore::open_with(&path, StoreOptions { target_version: 1 }).await;
  assert_eq!(older.err().map(|e| e.kind()), Some(ErrorKind::UpgradeFailure));

  let reopened = SqliteStore::open(&path).await.unwrap();
  assert_eq!(reopened.schema_version().await.unwrap(), LATEST_VERSION);
}

#[tokio::test]
async fn manager_opens_once_and_shares_the_handle() {
  let dir = tempfile::tempdir().unwrap();
  let manager = StoreManager::new(dir.path().join("epa.db"), StoreOptions::default());

  let (a, b) = tokio::join!(manager.open(), manager.open());
  let a = a.unwrap();
  let b = b.unwrap();
  a.create_dataset(NewDataset::named("Shared")).await.unwrap();
  assert_eq!(b.list_datasets().await.unwrap().len(), 1);
  assert!(manager.is_open().await);

  manager.close().await.unwrap();
  assert!(!manager.is_open().await);
  manager.close().await.unwrap();

  let reopened = manager.open().await.unwrap();
  assert_eq!(reopened.list_datasets().await.unwrap().len(), 1);
}
