//! Deterministic narrative drafts for employee summaries.

use crate::analytics::EmployeePerformance;

/// Rating scales above this maximum are treated as percentages.
const FOUR_POINT_CEILING: f64 = 5.0;

/// Qualitative band of an average score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
  Excellent,
  Good,
  Fair,
  Below,
}

impl Band {
  /// Banding follows the scale the scores appear to use: four-point ratings
  /// (3.5 / 3.0 / 2.5) when every score is at most 5, otherwise the
  /// percentage thresholds of the default mappings (85 / 75 / 65).
  pub fn of(average: f64, max_score: f64) -> Self {
    let [excellent, good, fair] = if max_score <= FOUR_POINT_CEILING {
      [3.5, 3.0, 2.5]
    } else {
      [85.0, 75.0, 65.0]
    };
    match average {
      a if a >= excellent => Self::Excellent,
      a if a >= good => Self::Good,
      a if a >= fair => Self::Fair,
      _ => Self::Below,
    }
  }

  fn sentence(self) -> &'static str {
    match self {
      Self::Excellent => {
        "Overall performance is excellent and consistently above \
         organisational expectations."
      }
      Self::Good => {
        "Overall performance is good, with stable results that meet the main \
         targets."
      }
      Self::Fair => {
        "Performance is fair, with several areas that still need improvement."
      }
      Self::Below => {
        "Performance is currently below organisational targets and calls for \
         a structured development plan."
      }
    }
  }
}

fn role(performance: &EmployeePerformance) -> String {
  let employee = &performance.employee;
  match (employee.jabatan.as_deref(), employee.sub_jabatan.as_deref()) {
    (Some(j), Some(s)) if !j.is_empty() && !s.is_empty() => {
      format!("serves as {j} ({s})")
    }
    (Some(j), _) if !j.is_empty() => format!("serves as {j}"),
    _ => "serves as an employee".to_owned(),
  }
}

/// Compose the summary draft for one employee's performance in one dataset.
///
/// Paragraphs: introduction, overall band, strengths, gaps, highlight and
/// a closing recommendation, separated by blank lines.
pub fn compose(performance: &EmployeePerformance) -> String {
  let employee = &performance.employee;
  let average = performance.average_score;

  let numeric: Vec<(&str, f64)> = performance
    .scores
    .iter()
    .filter_map(|s| s.score.numeric_value.map(|v| (s.competency.name.as_str(), v)))
    .collect();
  let top = numeric.iter().copied().max_by(|a, b| a.1.total_cmp(&b.1));
  let low = numeric.iter().copied().min_by(|a, b| a.1.total_cmp(&b.1));
  let max_score = top.map_or(0.0, |(_, v)| v);

  let nip = employee
    .nip
    .as_deref()
    .filter(|n| !n.is_empty())
    .map(|n| format!(" (NIP {n})"))
    .unwrap_or_default();

  let intro = format!(
    "{}{} currently {}. The average across {} evaluated competencies is {:.2}.",
    employee.name,
    nip,
    role(performance),
    performance.scores.len(),
    average
  );

  let strengths = if performance.strengths.is_empty() {
    "No competency with a numeric score stands out as a key strength yet."
      .to_owned()
  } else {
    format!("Key strengths include {}.", performance.strengths.join(", "))
  };

  let gaps = if performance.gaps.is_empty() {
    "No development areas are recorded because numeric scores are incomplete."
      .to_owned()
  } else {
    format!("Areas needing further attention include {}.", performance.gaps.join(", "))
  };

  let highlight = match (top, low) {
    (Some(top), Some(low)) if top.0 != low.0 => format!(
      "The highest score is in {} at {:.2}, while the lowest is in {} at {:.2}.",
      top.0, top.1, low.0, low.1
    ),
    (Some(top), _) => {
      format!("The strongest competency is {} at {:.2}.", top.0, top.1)
    }
    _ => "No numeric scores are available to describe competency results in \
          detail."
      .to_owned(),
  };

  let closing = "Recommended follow-up: scheduled feedback sessions, quarterly \
                 target reviews and relevant training support to accelerate \
                 progress.";

  [
    intro,
    Band::of(average, max_score).sentence().to_owned(),
    strengths,
    gaps,
    highlight,
    closing.to_owned(),
  ]
  .join("\n\n")
}
