use std::collections::HashMap;
use std::path::Path;

use crate::error::{SyncError, SyncResult};

pub const MARKS_FILE: &str = "marks.csv";

/// Submission id to display name, as listed in `marks.csv`.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    names: HashMap<String, String>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, submission_id: &str) -> Option<&str> {
        self.names.get(submission_id).map(String::as_str)
    }

    /// Mapped name, or `fallback` (the raw folder name) for unknown ids.
    pub fn display_name(&self, submission_id: &str, fallback: &str) -> String {
        self.get(submission_id).unwrap_or(fallback).to_string()
    }
}

/// Columns: submissionid, group, sheet, exercise, points, status.
/// The first line is a comment header and is skipped whatever it contains.
pub fn load_roster(csv_path: &Path) -> SyncResult<Roster> {
    if !csv_path.is_file() {
        return Err(SyncError::NotFound(
            csv_path.to_string_lossy().to_string(),
        ));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)?;

    let mut names = HashMap::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if i == 0 {
            continue;
        }
        let (Some(id), Some(group)) = (record.get(0), record.get(1)) else {
            continue;
        };
        names.insert(id.to_string(), group.to_string());
    }
    Ok(Roster { names })
}

/// Roster of a sheet root; an absent `marks.csv` is an empty roster.
pub fn load_roster_for_root(root: &Path) -> SyncResult<Roster> {
    match load_roster(&root.join(MARKS_FILE)) {
        Ok(r) => Ok(r),
        Err(SyncError::NotFound(_)) => Ok(Roster::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_is_always_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(MARKS_FILE);
        std::fs::write(
            &path,
            "ABC123,not,a,real,header,line\nXYZ9,Team XY,Sheet-1,exercise-1,,SUBMITTED\n",
        )
        .expect("write");

        let roster = load_roster(&path).expect("load");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("ABC123"), None);
        assert_eq!(roster.get("XYZ9"), Some("Team XY"));
    }

    #[test]
    fn quoted_group_names_keep_commas() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(MARKS_FILE);
        std::fs::write(
            &path,
            "#submissionid,group,sheet,exercise,points,status\n\
             A1,\"Doe, Jane\",Sheet-2,exercise-3,4.5,FINAL_MARK\n\
             short\n",
        )
        .expect("write");

        let roster = load_roster(&path).expect("load");
        assert_eq!(roster.display_name("A1", "Jane_Doe_A1"), "Doe, Jane");
        assert_eq!(roster.display_name("B2", "Bob_B2"), "Bob_B2");
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found_but_empty_for_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_roster(&dir.path().join(MARKS_FILE)).expect_err("missing");
        assert!(matches!(err, SyncError::NotFound(_)));

        let roster = load_roster_for_root(dir.path()).expect("root fallback");
        assert!(roster.is_empty());
    }
}
