//! Read-only aggregation over scores.
//!
//! Storage backends load the rows; the functions here turn them into the
//! statistics, listings and comparisons the API serves. Every function is a
//! single pass (plus sorting) over its inputs and nothing is cached, so a
//! caller that needs fresh numbers simply asks the store again.
//!
//! Only scores carrying a numeric value take part in averages, counts and
//! histograms; unmapped raw ratings are kept in the store but not scored.

use std::{
  cmp::Ordering,
  collections::{HashMap, HashSet},
};

use serde::{Deserialize, Serialize};

use crate::{
  identity::normalize,
  model::{Competency, Dataset, Employee, Score},
  position::PositionStatus,
  store::{EmployeeQuery, EmployeeSortField, SortDirection},
};

/// How many entries the dashboard rankings hold.
pub const TOP_N: usize = 5;

/// How many strengths and gaps an employee profile lists.
pub const HIGHLIGHTS: usize = 3;

const BUCKETS: [&str; 5] = ["0-1", "1-2", "2-3", "3-4", "4+"];

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBucket {
  pub range: String,
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyStats {
  pub competency:     Competency,
  pub average_score:  f64,
  /// Distinct employees with a numeric score for this competency.
  pub employee_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
  pub dataset:            Dataset,
  /// Employees linked to the dataset.
  pub total_employees:    usize,
  /// Distinct competencies with at least one score, numeric or not.
  pub total_competencies: usize,
  /// Scores carrying a numeric value.
  pub total_scores:       usize,
  pub average_score:      f64,
  /// Always the five fixed ranges, in order, including empty ones.
  pub score_distribution: Vec<ScoreBucket>,
  pub competency_stats:   Vec<CompetencyStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyDelta {
  pub competency:         Competency,
  pub base_average:       f64,
  pub comparison_average: f64,
  pub delta:              f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetComparison {
  pub base:              DatasetStats,
  pub comparison:        DatasetStats,
  pub competency_deltas: Vec<CompetencyDelta>,
  pub average_delta:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWithCompetency {
  pub score:      Score,
  pub competency: Competency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeePerformance {
  pub employee:      Employee,
  pub scores:        Vec<ScoreWithCompetency>,
  pub average_score: f64,
  /// Names of the highest-scoring competencies, best first.
  pub strengths:     Vec<String>,
  /// Names of the lowest-scoring competencies, worst first.
  pub gaps:          Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeWithStats {
  #[serde(flatten)]
  pub employee:        Employee,
  pub position_status: PositionStatus,
  pub average_score:   f64,
  pub score_count:     usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeListing {
  pub employees:   Vec<EmployeeWithStats>,
  /// Matches before paging.
  pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRanking {
  pub employee_id:   i64,
  pub name:          String,
  pub average_score: f64,
  pub score_count:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
  pub total_datasets:     usize,
  pub total_employees:    usize,
  pub total_competencies: usize,
  pub total_scores:       usize,
  pub average_score:      f64,
  pub score_distribution: Vec<ScoreBucket>,
  pub top_employees:      Vec<EmployeeRanking>,
  pub recent_datasets:    Vec<Dataset>,
  pub top_competencies:   Vec<CompetencyStats>,
}

// ─── Building blocks ─────────────────────────────────────────────────────────

fn mean(sum: f64, count: usize) -> f64 {
  if count == 0 { 0.0 } else { sum / count as f64 }
}

fn numeric(scores: &[Score]) -> impl Iterator<Item = (&Score, f64)> {
  scores.iter().filter_map(|s| s.numeric_value.map(|v| (s, v)))
}

fn bucket_of(value: f64) -> usize {
  match value {
    v if v < 1.0 => 0,
    v if v < 2.0 => 1,
    v if v < 3.0 => 2,
    v if v < 4.0 => 3,
    _ => 4,
  }
}

pub fn score_distribution(scores: &[Score]) -> Vec<ScoreBucket> {
  let mut counts = [0usize; BUCKETS.len()];
  for (_, value) in numeric(scores) {
    counts[bucket_of(value)] += 1;
  }
  BUCKETS
    .iter()
    .zip(counts)
    .map(|(range, count)| ScoreBucket { range: (*range).to_owned(), count })
    .collect()
}

fn by_display_order(a: &Competency, b: &Competency) -> Ordering {
  a.display_order
    .cmp(&b.display_order)
    .then_with(|| a.name.cmp(&b.name))
}

/// Per-competency mean and evaluated-employee count, in display order.
/// Competencies without a numeric score are omitted.
pub fn competency_stats(
  scores: &[Score],
  competencies: &[Competency],
) -> Vec<CompetencyStats> {
  let mut acc: HashMap<i64, (f64, usize, HashSet<i64>)> = HashMap::new();
  for (score, value) in numeric(scores) {
    let entry = acc.entry(score.competency_id).or_default();
    entry.0 += value;
    entry.1 += 1;
    entry.2.insert(score.employee_id);
  }

  let mut stats: Vec<CompetencyStats> = competencies
    .iter()
    .filter_map(|c| {
      acc.get(&c.id).map(|(sum, count, employees)| CompetencyStats {
        competency:     c.clone(),
        average_score:  mean(*sum, *count),
        employee_count: employees.len(),
      })
    })
    .collect();
  stats.sort_by(|a, b| by_display_order(&a.competency, &b.competency));
  stats
}

// ─── Dataset views ───────────────────────────────────────────────────────────

/// Statistics for one dataset from its scores and linked-employee count.
pub fn dataset_stats(
  dataset: Dataset,
  linked_employees: usize,
  scores: &[Score],
  competencies: &[Competency],
) -> DatasetStats {
  let (sum, count) =
    numeric(scores).fold((0.0, 0usize), |(sum, n), (_, v)| (sum + v, n + 1));
  let evaluated: HashSet<i64> = scores.iter().map(|s| s.competency_id).collect();

  DatasetStats {
    dataset,
    total_employees: linked_employees,
    total_competencies: evaluated.len(),
    total_scores: count,
    average_score: mean(sum, count),
    score_distribution: score_distribution(scores),
    competency_stats: competency_stats(scores, competencies),
  }
}

/// Per-competency deltas (`comparison - base`). A competency present on only
/// one side counts as zero on the other.
pub fn compare(base: DatasetStats, comparison: DatasetStats) -> DatasetComparison {
  let base_by_id: HashMap<i64, &CompetencyStats> = base
    .competency_stats
    .iter()
    .map(|s| (s.competency.id, s))
    .collect();

  let mut deltas: Vec<CompetencyDelta> = comparison
    .competency_stats
    .iter()
    .map(|cmp| {
      let base_average =
        base_by_id.get(&cmp.competency.id).map_or(0.0, |b| b.average_score);
      CompetencyDelta {
        competency: cmp.competency.clone(),
        base_average,
        comparison_average: cmp.average_score,
        delta: cmp.average_score - base_average,
      }
    })
    .collect();

  let seen: HashSet<i64> =
    comparison.competency_stats.iter().map(|s| s.competency.id).collect();
  deltas.extend(
    base
      .competency_stats
      .iter()
      .filter(|b| !seen.contains(&b.competency.id))
      .map(|b| CompetencyDelta {
        competency:         b.competency.clone(),
        base_average:       b.average_score,
        comparison_average: 0.0,
        delta:              -b.average_score,
      }),
  );
  deltas.sort_by(|a, b| by_display_order(&a.competency, &b.competency));

  let average_delta = comparison.average_score - base.average_score;
  DatasetComparison {
    base,
    comparison,
    competency_deltas: deltas,
    average_delta,
  }
}

// ─── Employee views ──────────────────────────────────────────────────────────

/// Profile of one employee within one dataset.
pub fn employee_performance(
  employee: Employee,
  mut scores: Vec<ScoreWithCompetency>,
) -> EmployeePerformance {
  scores.sort_by(|a, b| by_display_order(&a.competency, &b.competency));

  let mut ranked: Vec<(&str, f64)> = scores
    .iter()
    .filter_map(|s| s.score.numeric_value.map(|v| (s.competency.name.as_str(), v)))
    .collect();
  let average_score = mean(ranked.iter().map(|(_, v)| v).sum(), ranked.len());

  ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
  let strengths = ranked
    .iter()
    .take(HIGHLIGHTS)
    .map(|(n, _)| (*n).to_owned())
    .collect();

  ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
  let gaps = ranked
    .iter()
    .take(HIGHLIGHTS)
    .map(|(n, _)| (*n).to_owned())
    .collect();

  EmployeePerformance { employee, scores, average_score, strengths, gaps }
}

fn role_key(e: &Employee) -> String {
  normalize(&format!(
    "{} {}",
    e.jabatan.as_deref().unwrap_or_default(),
    e.sub_jabatan.as_deref().unwrap_or_default()
  ))
}

fn matches_needle(e: &Employee, needle: &str) -> bool {
  std::iter::once(Some(e.name.as_str()))
    .chain([
      e.nip.as_deref(),
      e.jabatan.as_deref(),
      e.sub_jabatan.as_deref(),
    ])
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Filter, sort and page the employees linked to a dataset.
///
/// `scores` are the dataset's scores. Ties on the sort field fall back to the
/// lower-cased name, ascending regardless of direction.
pub fn list_employees(
  linked: Vec<Employee>,
  scores: &[Score],
  query: &EmployeeQuery,
) -> EmployeeListing {
  let mut per_employee: HashMap<i64, (f64, usize)> = HashMap::new();
  for (score, value) in numeric(scores) {
    let entry = per_employee.entry(score.employee_id).or_default();
    entry.0 += value;
    entry.1 += 1;
  }

  let needle = query.needle();
  let mut rows: Vec<EmployeeWithStats> = linked
    .into_iter()
    .filter(|e| needle.as_deref().is_none_or(|n| matches_needle(e, n)))
    .map(|employee| {
      let (sum, count) = per_employee.get(&employee.id).copied().unwrap_or_default();
      EmployeeWithStats {
        position_status: PositionStatus::derive(
          employee.jabatan.as_deref(),
          employee.sub_jabatan.as_deref(),
          employee.gol.as_deref(),
        ),
        average_score: mean(sum, count),
        score_count: count,
        employee,
      }
    })
    .collect();

  let field = query.sort_by.unwrap_or_default();
  let direction = query.direction.unwrap_or_default();
  rows.sort_by(|a, b| {
    let primary = compare_field(field, a, b);
    let primary = match direction {
      SortDirection::Asc => primary,
      SortDirection::Desc => primary.reverse(),
    };
    primary
      .then_with(|| {
        a.employee.name.to_lowercase().cmp(&b.employee.name.to_lowercase())
      })
      .then_with(|| a.employee.id.cmp(&b.employee.id))
  });

  let total_count = rows.len();
  let employees = rows
    .into_iter()
    .skip(query.offset())
    .take(query.limit())
    .collect();

  EmployeeListing { employees, total_count }
}

fn compare_field(
  field: EmployeeSortField,
  a: &EmployeeWithStats,
  b: &EmployeeWithStats,
) -> Ordering {
  let (ea, eb) = (&a.employee, &b.employee);
  match field {
    EmployeeSortField::Name => ea.name.to_lowercase().cmp(&eb.name.to_lowercase()),
    EmployeeSortField::Nip => {
      let nip = |e: &Employee| e.nip.as_deref().unwrap_or_default().to_lowercase();
      nip(ea).cmp(&nip(eb))
    }
    EmployeeSortField::Jabatan => role_key(ea).cmp(&role_key(eb)),
    EmployeeSortField::Status => {
      a.position_status.to_string().cmp(&b.position_status.to_string())
    }
    EmployeeSortField::AverageScore => a.average_score.total_cmp(&b.average_score),
    EmployeeSortField::ScoreCount => a.score_count.cmp(&b.score_count),
    EmployeeSortField::CreatedAt => ea.created_at.cmp(&eb.created_at),
  }
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

/// Organisation-wide overview across every dataset.
pub fn dashboard(
  datasets: Vec<Dataset>,
  employees: &[Employee],
  competencies: &[Competency],
  scores: &[Score],
) -> DashboardOverview {
  let (sum, count) =
    numeric(scores).fold((0.0, 0usize), |(sum, n), (_, v)| (sum + v, n + 1));

  let mut per_employee: HashMap<i64, (f64, usize)> = HashMap::new();
  for (score, value) in numeric(scores) {
    let entry = per_employee.entry(score.employee_id).or_default();
    entry.0 += value;
    entry.1 += 1;
  }
  let mut top_employees: Vec<EmployeeRanking> = employees
    .iter()
    .filter_map(|e| {
      per_employee.get(&e.id).map(|(sum, n)| EmployeeRanking {
        employee_id:   e.id,
        name:          e.name.clone(),
        average_score: mean(*sum, *n),
        score_count:   *n,
      })
    })
    .collect();
  top_employees.sort_by(|a, b| {
    b.average_score
      .total_cmp(&a.average_score)
      .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
  });
  top_employees.truncate(TOP_N);

  let mut top_competencies = competency_stats(scores, competencies);
  // Stable sort keeps display order among equal averages.
  top_competencies.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
  top_competencies.truncate(TOP_N);

  let total_datasets = datasets.len();
  let mut recent_datasets = datasets;
  recent_datasets.sort_by(|a, b| {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
  });
  recent_datasets.truncate(TOP_N);

  DashboardOverview {
    total_datasets,
    total_employees: employees.len(),
    total_competencies: competencies.len(),
    total_scores: count,
    average_score: mean(sum, count),
    score_distribution: score_distribution(scores),
    top_employees,
    recent_datasets,
    top_competencies,
  }
}
