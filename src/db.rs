use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

pub fn db_path(data_root: &Path) -> PathBuf {
    data_root.join("db").join("intern").join("grading.db")
}

pub fn open_db(data_root: &Path) -> SyncResult<Connection> {
    let path = db_path(data_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    let conn = Connection::open(&path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> SyncResult<Connection> {
    let conn = Connection::open_in_memory()?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> SyncResult<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sheets(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            release_date TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exercises(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL REFERENCES sheets(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            title TEXT,
            max_points REAL NOT NULL DEFAULT 0.0,
            UNIQUE(sheet_id, code)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS error_codes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL REFERENCES sheets(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            description TEXT,
            deduction REAL NOT NULL DEFAULT 0.0,
            comment TEXT,
            UNIQUE(sheet_id, code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_error_codes_sheet ON error_codes(sheet_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT,
            sheet_id INTEGER NOT NULL REFERENCES sheets(id) ON DELETE CASCADE,
            exercise_id INTEGER REFERENCES exercises(id) ON DELETE SET NULL,
            group_name TEXT,
            submitter TEXT,
            path TEXT,
            status TEXT NOT NULL DEFAULT 'SUBMITTED',
            submitted_at TEXT,
            file_count INTEGER DEFAULT 0,
            file_hash TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            CHECK (status IN ('SUBMITTED', 'PROVISIONAL_MARK', 'FINAL_MARK', 'RESUBMITTED', 'ABSEND', 'SICK'))
        )",
        [],
    )?;
    // Databases from early revisions predate these columns.
    ensure_submissions_external_id(conn)?;
    ensure_submissions_file_columns(conn)?;
    migrate_submission_statuses(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_sheet_ex ON submissions(sheet_id, exercise_id)",
        [],
    )?;
    // Path is the natural key the reconciler matches on.
    dedupe_submission_paths(conn)?;
    ensure_unique_index(conn, "idx_submissions_path", "submissions", "path")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS files(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id INTEGER NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            relative_path TEXT,
            size_bytes INTEGER,
            mime_type TEXT,
            uploaded_at TEXT DEFAULT (datetime('now'))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_files_submission ON files(submission_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS feedback(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id INTEGER NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            sheet_id INTEGER NOT NULL REFERENCES sheets(id) ON DELETE CASCADE,
            exercise_id INTEGER REFERENCES exercises(id) ON DELETE SET NULL,
            grader TEXT,
            points REAL,
            markdown_content TEXT,
            pdf_path TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT
        )",
        [],
    )?;
    // Older revisions wrote feedback with INSERT OR REPLACE but no unique key,
    // which left duplicates behind. Keep the newest row per submission.
    dedupe_feedback_rows(conn)?;
    ensure_unique_index(conn, "idx_feedback_submission", "feedback", "submission_id")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS feedback_history(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            feedback_id INTEGER NOT NULL REFERENCES feedback(id) ON DELETE CASCADE,
            grader TEXT,
            points REAL,
            markdown_content TEXT,
            pdf_path TEXT,
            changed_at TEXT DEFAULT (datetime('now'))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_history_feedback ON feedback_history(feedback_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS answer_sheets(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL UNIQUE REFERENCES sheets(id) ON DELETE CASCADE,
            path_to_file TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grader_state(
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TEXT DEFAULT (datetime('now'))
        )",
        [],
    )?;

    Ok(())
}

fn ensure_submissions_external_id(conn: &Connection) -> SyncResult<()> {
    if table_has_column(conn, "submissions", "external_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE submissions ADD COLUMN external_id TEXT", [])?;
    Ok(())
}

fn ensure_submissions_file_columns(conn: &Connection) -> SyncResult<()> {
    if !table_has_column(conn, "submissions", "file_count")? {
        conn.execute(
            "ALTER TABLE submissions ADD COLUMN file_count INTEGER DEFAULT 0",
            [],
        )?;
    }
    if !table_has_column(conn, "submissions", "file_hash")? {
        conn.execute("ALTER TABLE submissions ADD COLUMN file_hash TEXT", [])?;
    }
    Ok(())
}

fn migrate_submission_statuses(conn: &Connection) -> SyncResult<()> {
    // The first revisions tracked progress as not_started/graded before the
    // roster status vocabulary was adopted.
    conn.execute(
        "UPDATE submissions SET status = 'SUBMITTED'
         WHERE status IN ('not_started', 'NOT_STARTED', 'completed')",
        [],
    )?;
    conn.execute(
        "UPDATE submissions SET status = 'FINAL_MARK' WHERE status = 'graded'",
        [],
    )?;
    Ok(())
}

fn dedupe_feedback_rows(conn: &Connection) -> SyncResult<()> {
    conn.execute(
        "DELETE FROM feedback
         WHERE id NOT IN (SELECT MAX(id) FROM feedback GROUP BY submission_id)",
        [],
    )?;
    Ok(())
}

fn dedupe_submission_paths(conn: &Connection) -> SyncResult<()> {
    let removed = conn.execute(
        "DELETE FROM submissions
         WHERE path IS NOT NULL
           AND id NOT IN (SELECT MAX(id) FROM submissions WHERE path IS NOT NULL GROUP BY path)",
        [],
    )?;
    if removed > 0 {
        tracing::warn!(removed, "dropped submissions with duplicate paths");
    }
    Ok(())
}

/// Creates `index` as a unique index on `table(column)`. Databases written by
/// the first revisions carry a plain index under the same name, which is
/// dropped first so that `ON CONFLICT(column)` upserts have a target.
fn ensure_unique_index(conn: &Connection, index: &str, table: &str, column: &str) -> SyncResult<()> {
    match index_is_unique(conn, table, index)? {
        Some(true) => return Ok(()),
        Some(false) => {
            conn.execute(&format!("DROP INDEX {}", index), [])?;
        }
        None => {}
    }
    conn.execute(
        &format!("CREATE UNIQUE INDEX {} ON {}({})", index, table, column),
        [],
    )?;
    Ok(())
}

// `None` when `table` has no index named `index`.
fn index_is_unique(conn: &Connection, table: &str, index: &str) -> SyncResult<Option<bool>> {
    let sql = format!("PRAGMA index_list({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == index {
            let unique: i64 = row.get(2)?;
            return Ok(Some(unique != 0));
        }
    }
    Ok(None)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> SyncResult<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
