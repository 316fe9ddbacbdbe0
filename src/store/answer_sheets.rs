use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::grader_state::{load_bool, save_bool};
use crate::error::{SyncError, SyncResult};

pub const ANSWER_SHEET_FILENAME: &str = "answer_sheet.pdf";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheetStatus {
    pub sheet_id: i64,
    pub configured_path: Option<PathBuf>,
    pub exists_on_disk: bool,
}

impl AnswerSheetStatus {
    pub fn effective_path(&self) -> Option<&Path> {
        if self.exists_on_disk {
            self.configured_path.as_deref()
        } else {
            None
        }
    }
}

pub fn get_answer_sheet_path(conn: &Connection, sheet_id: i64) -> SyncResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT path_to_file FROM answer_sheets WHERE sheet_id = ?",
            [sheet_id],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn save_answer_sheet_path(conn: &Connection, sheet_id: i64, path: &str) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO answer_sheets(sheet_id, path_to_file, updated_at) VALUES(?, ?, datetime('now'))
         ON CONFLICT(sheet_id) DO UPDATE SET
           path_to_file = excluded.path_to_file,
           updated_at = excluded.updated_at",
        (sheet_id, path),
    )?;
    Ok(())
}

pub fn delete_answer_sheet_path(conn: &Connection, sheet_id: i64) -> SyncResult<()> {
    conn.execute("DELETE FROM answer_sheets WHERE sheet_id = ?", [sheet_id])?;
    Ok(())
}

pub fn answer_sheet_status(conn: &Connection, sheet_id: i64) -> SyncResult<AnswerSheetStatus> {
    let configured_path = get_answer_sheet_path(conn, sheet_id)?.map(PathBuf::from);
    let exists_on_disk = configured_path.as_deref().map(Path::exists).unwrap_or(false);
    Ok(AnswerSheetStatus {
        sheet_id,
        configured_path,
        exists_on_disk,
    })
}

/// Copies `source` to `<root>/answer_sheet.pdf` and links it to the sheet.
pub fn store_answer_sheet(
    conn: &Connection,
    sheet_id: i64,
    root: &Path,
    source: &Path,
) -> SyncResult<AnswerSheetStatus> {
    if !source.is_file() {
        return Err(SyncError::NotFound(source.to_string_lossy().to_string()));
    }
    std::fs::create_dir_all(root).map_err(|e| SyncError::io(root, e))?;
    let target = root.join(ANSWER_SHEET_FILENAME);
    let same_file = match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same_file {
        std::fs::copy(source, &target).map_err(|e| SyncError::io(&target, e))?;
    }
    save_answer_sheet_path(conn, sheet_id, &target.to_string_lossy())?;
    answer_sheet_status(conn, sheet_id)
}

/// Deletes the linked file if it is still there, then the row.
pub fn remove_answer_sheet(conn: &Connection, sheet_id: i64) -> SyncResult<AnswerSheetStatus> {
    let status = answer_sheet_status(conn, sheet_id)?;
    if let Some(p) = status.configured_path.as_deref() {
        match std::fs::remove_file(p) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::io(p, e)),
        }
    }
    delete_answer_sheet_path(conn, sheet_id)?;
    answer_sheet_status(conn, sheet_id)
}

fn toggle_key(prefix: &str, sheet_id: i64) -> String {
    format!("{}_answer_sheet_pref_{}", prefix, sheet_id)
}

/// Whether the answer sheet panel should be shown. Defaults to
/// `has_answer_sheet`; a stored "true" is reset when no sheet is linked.
pub fn answer_sheet_toggle(
    conn: &Connection,
    prefix: &str,
    sheet_id: i64,
    has_answer_sheet: bool,
) -> SyncResult<bool> {
    let key = toggle_key(prefix, sheet_id);
    let visible = load_bool(conn, &key, has_answer_sheet)?;
    if visible && !has_answer_sheet {
        save_bool(conn, &key, false)?;
        return Ok(false);
    }
    Ok(visible)
}

pub fn set_answer_sheet_toggle(
    conn: &Connection,
    prefix: &str,
    sheet_id: i64,
    visible: bool,
) -> SyncResult<()> {
    save_bool(conn, &toggle_key(prefix, sheet_id), visible)
}
