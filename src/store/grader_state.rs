use rusqlite::{Connection, OptionalExtension};

use super::submissions::get_submissions;
use crate::error::{SyncError, SyncResult};

const CURRENT_SUBMISSION_KEY: &str = "review_current_submission_id";
const EXERCISE_FILTER_KEY: &str = "review_exercise_filter";
const CURRENT_ROOT_KEY: &str = "current_root";

/// Stored exercise filter meaning "no filter".
pub const ALL_EXERCISES: &str = "all";

pub fn load_grader_state(conn: &Connection, key: &str) -> SyncResult<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row("SELECT value FROM grader_state WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(value.flatten())
}

pub fn save_grader_state(conn: &Connection, key: &str, value: &str) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO grader_state(key, value, updated_at) VALUES(?, ?, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value),
    )?;
    Ok(())
}

pub fn delete_grader_state(conn: &Connection, key: &str) -> SyncResult<()> {
    conn.execute("DELETE FROM grader_state WHERE key = ?", [key])?;
    Ok(())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

pub fn load_bool(conn: &Connection, key: &str, fallback: bool) -> SyncResult<bool> {
    Ok(load_grader_state(conn, key)?
        .map(|v| parse_bool(&v))
        .unwrap_or(fallback))
}

pub fn save_bool(conn: &Connection, key: &str, value: bool) -> SyncResult<()> {
    save_grader_state(conn, key, if value { "true" } else { "false" })
}

pub fn load_current_root(conn: &Connection) -> SyncResult<Option<String>> {
    load_grader_state(conn, CURRENT_ROOT_KEY)
}

pub fn save_current_root(conn: &Connection, root: &str) -> SyncResult<()> {
    save_grader_state(conn, CURRENT_ROOT_KEY, root)
}

/// Saved filter if it is still offered, else [`ALL_EXERCISES`].
pub fn load_exercise_filter(conn: &Connection, options: &[String]) -> SyncResult<String> {
    let saved = load_grader_state(conn, EXERCISE_FILTER_KEY)?;
    Ok(match saved {
        Some(v) if options.iter().any(|o| *o == v) => v,
        _ => ALL_EXERCISES.to_string(),
    })
}

pub fn save_exercise_filter(conn: &Connection, value: &str) -> SyncResult<()> {
    if load_grader_state(conn, EXERCISE_FILTER_KEY)?.as_deref() == Some(value) {
        return Ok(());
    }
    save_grader_state(conn, EXERCISE_FILTER_KEY, value)
}

pub fn get_current_submission_id(conn: &Connection) -> SyncResult<Option<i64>> {
    Ok(load_grader_state(conn, CURRENT_SUBMISSION_KEY)?.and_then(|v| v.trim().parse().ok()))
}

pub fn set_current_submission_id(conn: &Connection, submission_id: i64) -> SyncResult<()> {
    save_grader_state(conn, CURRENT_SUBMISSION_KEY, &submission_id.to_string())
}

/// Persisted review position if it is one of `ordered_ids`, else the first
/// id. The result is persisted.
pub fn resolve_current_submission(conn: &Connection, ordered_ids: &[i64]) -> SyncResult<i64> {
    let Some(first) = ordered_ids.first().copied() else {
        return Err(SyncError::NotFound("no submissions found".into()));
    };
    let current = get_current_submission_id(conn)?
        .filter(|id| ordered_ids.contains(id))
        .unwrap_or(first);
    set_current_submission_id(conn, current)?;
    Ok(current)
}

/// Moves the review position by `delta` within the id-ordered, filtered
/// submission list. Clamps at both ends; an unknown position starts at the
/// first entry.
pub fn step_current_submission(
    conn: &Connection,
    delta: i64,
    sheet_id: Option<i64>,
    exercise_code: Option<&str>,
) -> SyncResult<i64> {
    let ids: Vec<i64> = get_submissions(conn, sheet_id, exercise_code)?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if ids.is_empty() {
        return Err(SyncError::NotFound("no submissions found".into()));
    }

    let current = get_current_submission_id(conn)?;
    let next = match current.and_then(|c| ids.iter().position(|id| *id == c)) {
        Some(idx) => {
            let last = ids.len() as i64 - 1;
            let target = (idx as i64).saturating_add(delta).clamp(0, last);
            ids[target as usize]
        }
        None => ids[0],
    };
    set_current_submission_id(conn, next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;

    #[test]
    fn grader_state_round_trips_strings() {
        let conn = test_support::conn();
        assert_eq!(load_grader_state(&conn, "k").expect("load"), None);
        save_grader_state(&conn, "k", "v1").expect("save");
        save_grader_state(&conn, "k", "v2").expect("overwrite");
        assert_eq!(load_grader_state(&conn, "k").expect("load").as_deref(), Some("v2"));
        delete_grader_state(&conn, "k").expect("delete");
        assert_eq!(load_grader_state(&conn, "k").expect("load"), None);

        assert!(load_bool(&conn, "flag", true).expect("fallback"));
        save_bool(&conn, "flag", false).expect("save");
        assert!(!load_bool(&conn, "flag", true).expect("stored"));
        save_grader_state(&conn, "flag", "Yes").expect("save");
        assert!(load_bool(&conn, "flag", false).expect("stored"));
    }

    #[test]
    fn step_clamps_and_honours_exercise_filter() {
        let conn = test_support::conn();
        let sheet = test_support::insert_sheet(&conn, "Sheet-Blatt 1");
        let e1 = test_support::insert_exercise(&conn, sheet, "Exercise-1");
        let e2 = test_support::insert_exercise(&conn, sheet, "Exercise-2");
        let subs = [
            test_support::insert_submission(&conn, sheet, e1, 1),
            test_support::insert_submission(&conn, sheet, e1, 2),
            test_support::insert_submission(&conn, sheet, e2, 3),
            test_support::insert_submission(&conn, sheet, e2, 4),
        ];

        set_current_submission_id(&conn, subs[1]).expect("set");
        assert_eq!(get_current_submission_id(&conn).expect("get"), Some(subs[1]));

        assert_eq!(step_current_submission(&conn, 1, None, None).expect("step"), subs[2]);
        assert_eq!(get_current_submission_id(&conn).expect("get"), Some(subs[2]));

        assert_eq!(step_current_submission(&conn, 10, None, None).expect("step"), subs[3]);
        assert_eq!(step_current_submission(&conn, 10, None, None).expect("step"), subs[3]);
        assert_eq!(step_current_submission(&conn, -10, None, None).expect("step"), subs[0]);

        set_current_submission_id(&conn, subs[2]).expect("set");
        assert_eq!(
            step_current_submission(&conn, 1, None, Some("Exercise-2")).expect("step"),
            subs[3]
        );
        assert_eq!(
            step_current_submission(&conn, -5, None, Some("Exercise-2")).expect("step"),
            subs[2]
        );

        // Position outside the filtered list restarts at its first entry.
        set_current_submission_id(&conn, subs[0]).expect("set");
        assert_eq!(
            step_current_submission(&conn, 1, Some(sheet), Some("Exercise-2")).expect("step"),
            subs[2]
        );

        assert!(matches!(
            step_current_submission(&conn, 1, None, Some("Exercise-9")),
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn resolve_prefers_persisted_valid_id() {
        let conn = test_support::conn();
        assert!(resolve_current_submission(&conn, &[]).is_err());

        set_current_submission_id(&conn, 7).expect("set");
        assert_eq!(resolve_current_submission(&conn, &[3, 7, 9]).expect("resolve"), 7);
        assert_eq!(resolve_current_submission(&conn, &[3, 9]).expect("resolve"), 3);
        assert_eq!(get_current_submission_id(&conn).expect("get"), Some(3));
    }

    #[test]
    fn exercise_filter_falls_back_to_all() {
        let conn = test_support::conn();
        let options = vec!["exercise-1".to_string(), "exercise-2".to_string()];
        assert_eq!(load_exercise_filter(&conn, &options).expect("load"), ALL_EXERCISES);
        save_exercise_filter(&conn, "exercise-2").expect("save");
        assert_eq!(load_exercise_filter(&conn, &options).expect("load"), "exercise-2");
        assert_eq!(
            load_exercise_filter(&conn, &options[..1]).expect("load"),
            ALL_EXERCISES
        );
    }
}
