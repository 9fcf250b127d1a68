//! Roster loading and selection — the boundary to the external student
//! store.
//!
//! The store itself is someone else's problem; this module consumes its
//! materialised response (an ordered JSON array of student records), applies
//! the caller's filter, and sorts for printing the way the front office
//! expects: by class, then roll number, both compared numerically so roll
//! "10" follows roll "2".

use crate::error::GenerationError;
use crate::model::StudentRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Which students of a roster a job should cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentFilter {
    /// Every student in the roster (default).
    #[default]
    All,
    /// Students admitted for the given class/level.
    Level(String),
    /// An explicit identifier set; matches store id, roll number, or GR
    /// number.
    Ids(Vec<String>),
}

impl StudentFilter {
    /// Apply the filter, preserving roster order.
    pub fn apply(&self, students: Vec<StudentRecord>) -> Vec<StudentRecord> {
        match self {
            StudentFilter::All => students,
            StudentFilter::Level(level) => students
                .into_iter()
                .filter(|s| s.admission_for.trim() == level.trim())
                .collect(),
            StudentFilter::Ids(ids) => students
                .into_iter()
                .filter(|s| {
                    ids.iter().any(|id| {
                        id == &s.id
                            || (!s.roll_number.is_empty() && id == &s.roll_number)
                            || (!s.gr_number.is_empty() && id == &s.gr_number)
                    })
                })
                .collect(),
        }
    }
}

/// Load an ordered roster from a JSON file (an array of student records).
pub fn load_roster(path: &Path) -> Result<Vec<StudentRecord>, GenerationError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GenerationError::RosterNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GenerationError::RosterParse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;

    let students: Vec<StudentRecord> =
        serde_json::from_str(&raw).map_err(|e| GenerationError::RosterParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    debug!("Loaded {} students from {}", students.len(), path.display());
    Ok(students)
}

/// Sort for print order: class ascending, then roll number ascending, both
/// numeric-aware. Records without a parseable number sort last.
pub fn sort_for_print(students: &mut [StudentRecord]) {
    students.sort_by(|a, b| {
        numeric_key(&a.admission_for)
            .cmp(&numeric_key(&b.admission_for))
            .then(numeric_key(&a.roll_number).cmp(&numeric_key(&b.roll_number)))
    });
}

/// Extract the digits of a field as a sortable number; `u64::MAX` when no
/// digits are present so blanks go last.
fn numeric_key(value: &str) -> u64 {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn student(id: &str, class: &str, roll: &str) -> StudentRecord {
        StudentRecord {
            id: id.into(),
            full_name: format!("Student {id}"),
            admission_for: class.into(),
            roll_number: roll.into(),
            ..Default::default()
        }
    }

    #[test]
    fn level_filter_matches_trimmed_class() {
        let roster = vec![student("a", "9", "1"), student("b", " 9 ", "2"), student("c", "10", "3")];
        let out = StudentFilter::Level("9".into()).apply(roster);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn ids_filter_matches_any_identifier_kind() {
        let mut s = student("store-1", "9", "14");
        s.gr_number = "1021".into();
        let roster = vec![s, student("store-2", "9", "15")];

        let out = StudentFilter::Ids(vec!["1021".into()]).apply(roster.clone());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "store-1");

        let out = StudentFilter::Ids(vec!["store-2".into(), "14".into()]).apply(roster);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn filter_preserves_roster_order() {
        let roster = vec![student("a", "9", "3"), student("b", "9", "1"), student("c", "9", "2")];
        let out = StudentFilter::All.apply(roster);
        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn print_sort_is_numeric_not_lexicographic() {
        let mut roster = vec![
            student("a", "10", "2"),
            student("b", "9", "10"),
            student("c", "9", "2"),
            student("d", "9", ""),
        ];
        sort_for_print(&mut roster);
        let ids: Vec<&str> = roster.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "d", "a"]);
    }

    #[test]
    fn load_roster_reports_missing_file() {
        let err = load_roster(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, GenerationError::RosterNotFound { .. }));
    }

    #[test]
    fn load_roster_reports_bad_json() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"{ not json ]").unwrap();
        let err = load_roster(tmp.path()).unwrap_err();
        assert!(matches!(err, GenerationError::RosterParse { .. }));
    }

    #[test]
    fn load_roster_parses_camel_case_records() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(
            br#"[{"id":"s-1","fullName":"Ahmed Khan","rollNumber":"14","admissionFor":"9"}]"#,
        )
        .unwrap();
        let roster = load_roster(tmp.path()).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].full_name, "Ahmed Khan");
    }
}
