//! Identity normalization: turning display names into comparison keys.
//!
//! Two employee names denote the same person when their [`normalize`]d keys
//! are equal. Storage backends keep the key alongside the display name and
//! look employees up by it; nothing at the storage layer enforces uniqueness.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{
  Error, Result,
  model::{EmployeeFields, EmployeeRow},
};

/// Canonicalise a display name into an identity key.
///
/// Decomposes (NFKD), drops combining marks, replaces every non-letter with a
/// space, lower-cases, and collapses runs of whitespace. The result is
/// idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(name: &str) -> String {
  let letters: String = name
    .nfkd()
    .filter(|c| !is_combining_mark(*c))
    .map(|c| if c.is_alphabetic() { c } else { ' ' })
    .flat_map(char::to_lowercase)
    .collect();

  letters.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge two sets of optional attributes, keeping every field `existing`
/// already has and filling the blanks from `incoming`.
///
/// Every import path funnels through here. Callers pick the argument order
/// to pick the winner: the stored record is `existing` when filling gaps in
/// the master list, and the later row is `existing` when collapsing a batch.
pub fn merge_employee_fields(
  existing: &EmployeeFields,
  incoming: &EmployeeFields,
) -> EmployeeFields {
  fn pick(a: &Option<String>, b: &Option<String>) -> Option<String> {
    a.clone().or_else(|| b.clone())
  }

  EmployeeFields {
    nip:         pick(&existing.nip, &incoming.nip),
    gol:         pick(&existing.gol, &incoming.gol),
    jabatan:     pick(&existing.jabatan, &incoming.jabatan),
    sub_jabatan: pick(&existing.sub_jabatan, &incoming.sub_jabatan),
  }
}

/// One distinct identity after collapsing a batch of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedEmployee {
  /// The normalized identity key.
  pub key:    String,
  /// Display name of the last row carrying this identity, trimmed.
  pub name:   String,
  pub fields: EmployeeFields,
  /// Indices of every input row folded into this identity.
  pub rows:   Vec<usize>,
}

/// Collapse `rows` by normalized name, preserving first-seen order.
///
/// Later rows' non-blank fields win over earlier ones. Fails with
/// [`Error::BlankName`] on the first row whose name is blank after trimming
/// (or has no letters at all).
pub fn collapse_rows(rows: &[EmployeeRow]) -> Result<Vec<CollapsedEmployee>> {
  let mut collapsed: Vec<CollapsedEmployee> = Vec::new();

  for (row, input) in rows.iter().enumerate() {
    let name = input.name.trim();
    let key = normalize(name);
    if key.is_empty() {
      return Err(Error::BlankName { row });
    }

    let fields = EmployeeFields::from_row(input);
    match collapsed.iter_mut().find(|c| c.key == key) {
      Some(entry) => {
        entry.fields = merge_employee_fields(&fields, &entry.fields);
        entry.name = name.to_owned();
        entry.rows.push(row);
      }
      None => collapsed.push(CollapsedEmployee {
        key,
        name: name.to_owned(),
        fields,
        rows: vec![row],
      }),
    }
  }

  Ok(collapsed)
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn normalize_strips_diacritics_case_and_punctuation() {
    assert_eq!(normalize("  José  Ramírez "), "jose ramirez");
    assert_eq!(normalize("SITI NURHALIZA, S.Pd."), "siti nurhaliza s pd");
    assert_eq!(normalize("O'Brien\t-  Ñuñez"), "o brien nunez");
    assert_eq!(normalize("1234 .,"), "");
  }

  #[test]
  fn normalize_equates_display_variants() {
    assert_eq!(normalize("Dewi Lestari"), normalize("dewi   LESTARI"));
    assert_eq!(normalize("Zoë"), normalize("zoe"));
  }

  #[test]
  fn merge_keeps_existing_and_fills_gaps() {
    let existing = EmployeeFields {
      nip: Some("1".into()),
      gol: None,
      jabatan: Some("Kepala Seksi".into()),
      sub_jabatan: None,
    };
    let incoming = EmployeeFields {
      nip: Some("2".into()),
      gol: Some("III/c".into()),
      jabatan: None,
      sub_jabatan: None,
    };

    let merged = merge_employee_fields(&existing, &incoming);
    assert_eq!(merged.nip.as_deref(), Some("1"));
    assert_eq!(merged.gol.as_deref(), Some("III/c"));
    assert_eq!(merged.jabatan.as_deref(), Some("Kepala Seksi"));
    assert_eq!(merged.sub_jabatan, None);
  }

  #[test]
  fn collapse_prefers_later_non_blank_fields() {
    let rows = vec![
      EmployeeRow {
        name: "Budi Santoso".into(),
        nip: Some("111".into()),
        gol: Some("III/a".into()),
        ..Default::default()
      },
      EmployeeRow::named("Ana"),
      EmployeeRow {
        name: "budi  santoso".into(),
        nip: Some("222".into()),
        gol: Some(" ".into()),
        jabatan: Some("Staf".into()),
        ..Default::default()
      },
    ];

    let collapsed = collapse_rows(&rows).unwrap();
    assert_eq!(collapsed.len(), 2);

    let budi = &collapsed[0];
    assert_eq!(budi.name, "budi  santoso");
    assert_eq!(budi.rows, vec![0, 2]);
    assert_eq!(budi.fields.nip.as_deref(), Some("222"));
    assert_eq!(budi.fields.gol.as_deref(), Some("III/a"));
    assert_eq!(budi.fields.jabatan.as_deref(), Some("Staf"));
    assert_eq!(collapsed[1].key, "ana");
  }

  #[test]
  fn collapse_rejects_blank_names() {
    let rows = vec![EmployeeRow::named("Ana"), EmployeeRow::named("   ")];
    assert!(matches!(collapse_rows(&rows), Err(Error::BlankName { row: 1 })));

    let rows = vec![EmployeeRow::named("123 .,")];
    assert!(matches!(collapse_rows(&rows), Err(Error::BlankName { row: 0 })));
  }

  fn display_name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ A-Za-zÀ-ÖØ-Ýà-öø-ý.,'-]{0,40}").unwrap()
  }

  proptest! {
    #[test]
    fn normalize_is_idempotent(name in display_name()) {
      let once = normalize(&name);
      prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_ignores_case_and_surrounding_whitespace(
      name in display_name(),
      pad in "[ \t]{0,4}",
    ) {
      let padded = format!("{pad}{}{pad}", name.to_uppercase());
      prop_assert_eq!(normalize(&padded), normalize(&name));
    }
  }
}
