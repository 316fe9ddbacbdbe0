use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::submissions::SubmissionStatus;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: i64,
    pub submission_id: i64,
    pub sheet_id: i64,
    pub exercise_id: Option<i64>,
    pub points: Option<f64>,
    pub markdown_content: String,
    pub pdf_path: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackHistoryEntry {
    pub id: i64,
    pub points: Option<f64>,
    pub markdown_content: String,
    pub pdf_path: Option<String>,
    pub changed_at: Option<String>,
}

pub fn get_feedback(conn: &Connection, submission_id: i64) -> SyncResult<Option<Feedback>> {
    Ok(conn
        .query_row(
            "SELECT id, submission_id, sheet_id, exercise_id, points,
                    COALESCE(markdown_content, ''), pdf_path, created_at, updated_at
             FROM feedback
             WHERE submission_id = ?",
            [submission_id],
            |r| {
                Ok(Feedback {
                    id: r.get(0)?,
                    submission_id: r.get(1)?,
                    sheet_id: r.get(2)?,
                    exercise_id: r.get(3)?,
                    points: r.get(4)?,
                    markdown_content: r.get(5)?,
                    pdf_path: r.get(6)?,
                    created_at: r.get(7)?,
                    updated_at: r.get(8)?,
                })
            },
        )
        .optional()?)
}

/// The only write path for grading results: upserts the feedback row and sets
/// the submission status in one transaction. An overwritten row is first
/// copied to `feedback_history`.
pub fn save_feedback_with_submission(
    conn: &Connection,
    submission_id: i64,
    status: SubmissionStatus,
    points: f64,
    markdown_content: &str,
    pdf_path: Option<&str>,
) -> SyncResult<Feedback> {
    if !points.is_finite() || points < 0.0 {
        return Err(SyncError::Validation(
            "points must be a non-negative number".into(),
        ));
    }

    let tx = conn.unchecked_transaction()?;

    let owner: Option<(i64, Option<i64>)> = tx
        .query_row(
            "SELECT sheet_id, exercise_id FROM submissions WHERE id = ?",
            [submission_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((sheet_id, exercise_id)) = owner else {
        return Err(SyncError::NotFound(format!("submission {}", submission_id)));
    };

    tx.execute(
        "INSERT INTO feedback_history(feedback_id, grader, points, markdown_content, pdf_path)
         SELECT id, grader, points, markdown_content, pdf_path
         FROM feedback
         WHERE submission_id = ?",
        [submission_id],
    )?;

    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO feedback(submission_id, sheet_id, exercise_id, points, markdown_content, pdf_path, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(submission_id) DO UPDATE SET
           sheet_id = excluded.sheet_id,
           exercise_id = excluded.exercise_id,
           points = excluded.points,
           markdown_content = excluded.markdown_content,
           pdf_path = excluded.pdf_path,
           updated_at = excluded.updated_at",
        (
            submission_id,
            sheet_id,
            exercise_id,
            points,
            markdown_content,
            pdf_path,
            &now,
        ),
    )?;
    tx.execute(
        "UPDATE submissions SET status = ? WHERE id = ?",
        (status, submission_id),
    )?;
    tx.commit()?;

    get_feedback(conn, submission_id)?
        .ok_or_else(|| SyncError::NotFound(format!("feedback for submission {}", submission_id)))
}

/// Prior feedback states of a submission, newest first.
pub fn list_feedback_history(
    conn: &Connection,
    submission_id: i64,
) -> SyncResult<Vec<FeedbackHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT h.id, h.points, COALESCE(h.markdown_content, ''), h.pdf_path, h.changed_at
         FROM feedback_history h
         JOIN feedback f ON f.id = h.feedback_id
         WHERE f.submission_id = ?
         ORDER BY h.id DESC",
    )?;
    let rows = stmt
        .query_map([submission_id], |r| {
            Ok(FeedbackHistoryEntry {
                id: r.get(0)?,
                points: r.get(1)?,
                markdown_content: r.get(2)?,
                pdf_path: r.get(3)?,
                changed_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{get_submission, test_support};

    #[test]
    fn save_twice_keeps_one_row_and_second_values() {
        let conn = test_support::conn();
        let sheet = test_support::insert_sheet(&conn, "Sheet-Blatt 1");
        let ex = test_support::insert_exercise(&conn, sheet, "Exercise-1");
        let sub = test_support::insert_submission(&conn, sheet, ex, 1);

        let first = save_feedback_with_submission(
            &conn,
            sub,
            SubmissionStatus::FinalMark,
            8.5,
            "Great work",
            Some("/tmp/feedback.pdf"),
        )
        .expect("first save");
        assert_eq!(first.sheet_id, sheet);
        assert_eq!(first.exercise_id, Some(ex));
        assert_eq!(
            get_submission(&conn, sub).expect("lookup").map(|s| s.status),
            Some(SubmissionStatus::FinalMark)
        );

        let second = save_feedback_with_submission(
            &conn,
            sub,
            SubmissionStatus::ProvisionalMark,
            9.0,
            "Updated",
            None,
        )
        .expect("second save");
        assert_eq!(second.id, first.id);
        assert_eq!(second.points, Some(9.0));
        assert_eq!(second.markdown_content, "Updated");
        assert_eq!(second.pdf_path, None);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM feedback WHERE submission_id = ?",
                [sub],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(count, 1);
        assert_eq!(
            get_submission(&conn, sub).expect("lookup").map(|s| s.status),
            Some(SubmissionStatus::ProvisionalMark)
        );

        let history = list_feedback_history(&conn, sub).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].points, Some(8.5));
        assert_eq!(history[0].markdown_content, "Great work");
    }

    #[test]
    fn rejected_saves_leave_state_untouched() {
        let conn = test_support::conn();
        let sheet = test_support::insert_sheet(&conn, "Sheet-1");
        let ex = test_support::insert_exercise(&conn, sheet, "exercise-1");
        let sub = test_support::insert_submission(&conn, sheet, ex, 1);

        let err = save_feedback_with_submission(&conn, 4242, SubmissionStatus::FinalMark, 1.0, "", None)
            .expect_err("unknown submission");
        assert!(matches!(err, SyncError::NotFound(_)));

        let err = save_feedback_with_submission(&conn, sub, SubmissionStatus::FinalMark, -0.5, "", None)
            .expect_err("negative points");
        assert!(matches!(err, SyncError::Validation(_)));

        assert!(get_feedback(&conn, sub).expect("lookup").is_none());
        assert_eq!(
            get_submission(&conn, sub).expect("lookup").map(|s| s.status),
            Some(SubmissionStatus::Submitted)
        );
    }
}
