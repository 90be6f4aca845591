//! Staff / Eselon classification derived from position titles.

use serde::{Deserialize, Serialize};

use crate::identity::normalize;

const STAFF_KEYWORDS: [&str; 2] = ["staff", "staf"];

const ESELON_KEYWORDS: [&str; 14] = [
  "eselon",
  "kepala",
  "sekretaris",
  "kabid",
  "kabag",
  "kasubag",
  "kepala seksi",
  "kasi",
  "koordinator",
  "pengawas",
  "sub bagian",
  "subbagian",
  "subbidang",
  "sub bidang",
];

/// Whether an employee holds a structural (leadership) position.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
)]
pub enum PositionStatus {
  Eselon,
  Staff,
}

impl PositionStatus {
  /// Classify from the position title, sub-title and rank.
  ///
  /// Staff keywords win over leadership keywords. With no keyword match, a
  /// rank starting with `IV` means Eselon.
  pub fn derive(
    jabatan: Option<&str>,
    sub_jabatan: Option<&str>,
    gol: Option<&str>,
  ) -> Self {
    let title = normalize(&format!(
      "{} {}",
      jabatan.unwrap_or_default(),
      sub_jabatan.unwrap_or_default()
    ));

    if !title.is_empty() {
      if STAFF_KEYWORDS.iter().any(|k| title.contains(k)) {
        return Self::Staff;
      }
      if ESELON_KEYWORDS.iter().any(|k| title.contains(k)) {
        return Self::Eselon;
      }
    }

    let rank = gol.unwrap_or_default().trim().to_uppercase();
    if rank.starts_with("IV") { Self::Eselon } else { Self::Staff }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn staff_keyword_beats_leadership_keyword() {
    assert_eq!(
      PositionStatus::derive(Some("Staf Kepala Bidang"), None, Some("IV/a")),
      PositionStatus::Staff
    );
  }

  #[test]
  fn leadership_keywords_in_either_title() {
    assert_eq!(
      PositionStatus::derive(Some("Kasubag."), None, None),
      PositionStatus::Eselon
    );
    assert_eq!(
      PositionStatus::derive(Some("Analis"), Some("Sub Bagian Umum"), None),
      PositionStatus::Eselon
    );
  }

  #[test]
  fn rank_decides_without_keywords() {
    assert_eq!(
      PositionStatus::derive(Some("Analis"), None, Some(" iv/b")),
      PositionStatus::Eselon
    );
    assert_eq!(
      PositionStatus::derive(None, None, Some("III/d")),
      PositionStatus::Staff
    );
    assert_eq!(PositionStatus::derive(None, None, None), PositionStatus::Staff);
  }
}
