use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    ProvisionalMark,
    FinalMark,
    Resubmitted,
    Absend,
    Sick,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 6] = [
        SubmissionStatus::Submitted,
        SubmissionStatus::ProvisionalMark,
        SubmissionStatus::FinalMark,
        SubmissionStatus::Resubmitted,
        SubmissionStatus::Absend,
        SubmissionStatus::Sick,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::ProvisionalMark => "PROVISIONAL_MARK",
            SubmissionStatus::FinalMark => "FINAL_MARK",
            SubmissionStatus::Resubmitted => "RESUBMITTED",
            SubmissionStatus::Absend => "ABSEND",
            SubmissionStatus::Sick => "SICK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Counted as corrected in progress statistics.
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            SubmissionStatus::FinalMark | SubmissionStatus::ProvisionalMark
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for SubmissionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubmissionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        SubmissionStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown submission status: {}", s).into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: i64,
    pub sheet_id: i64,
    pub exercise_id: Option<i64>,
    pub exercise_code: String,
    pub external_id: Option<String>,
    pub path: String,
    pub group_name: String,
    pub submitter: String,
    pub status: SubmissionStatus,
    pub file_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFile {
    pub id: i64,
    pub filename: String,
    pub relative_path: Option<String>,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
}

const SUBMISSION_COLUMNS: &str = "s.id, s.sheet_id, s.exercise_id, COALESCE(e.code, ''),
    s.external_id, COALESCE(s.path, ''), COALESCE(s.group_name, ''),
    COALESCE(s.submitter, ''), s.status, COALESCE(s.file_count, 0)";

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<SubmissionRecord> {
    Ok(SubmissionRecord {
        id: r.get(0)?,
        sheet_id: r.get(1)?,
        exercise_id: r.get(2)?,
        exercise_code: r.get(3)?,
        external_id: r.get(4)?,
        path: r.get(5)?,
        group_name: r.get(6)?,
        submitter: r.get(7)?,
        status: r.get(8)?,
        file_count: r.get(9)?,
    })
}

/// Submissions ordered by id ascending, optionally narrowed to one sheet
/// and/or one exercise code.
pub fn get_submissions(
    conn: &Connection,
    sheet_id: Option<i64>,
    exercise_code: Option<&str>,
) -> SyncResult<Vec<SubmissionRecord>> {
    let sql = format!(
        "SELECT {}
         FROM submissions s
         LEFT JOIN exercises e ON e.id = s.exercise_id
         WHERE (?1 IS NULL OR s.sheet_id = ?1)
           AND (?2 IS NULL OR e.code = ?2)
         ORDER BY s.id",
        SUBMISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((sheet_id, exercise_code), submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_submission(conn: &Connection, submission_id: i64) -> SyncResult<Option<SubmissionRecord>> {
    let sql = format!(
        "SELECT {}
         FROM submissions s
         LEFT JOIN exercises e ON e.id = s.exercise_id
         WHERE s.id = ?",
        SUBMISSION_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [submission_id], submission_from_row)
        .optional()?)
}

pub fn list_submission_files(conn: &Connection, submission_id: i64) -> SyncResult<Vec<SubmissionFile>> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, relative_path, size_bytes, mime_type
         FROM files
         WHERE submission_id = ?
         ORDER BY relative_path, id",
    )?;
    let rows = stmt
        .query_map([submission_id], |r| {
            Ok(SubmissionFile {
                id: r.get(0)?,
                filename: r.get(1)?,
                relative_path: r.get(2)?,
                size_bytes: r.get(3)?,
                mime_type: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
