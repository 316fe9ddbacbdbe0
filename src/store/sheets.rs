use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: i64,
    pub sheet_id: i64,
    pub code: String,
    pub title: Option<String>,
    pub max_points: f64,
}

pub fn list_sheets(conn: &Connection) -> SyncResult<Vec<Sheet>> {
    let mut stmt =
        conn.prepare("SELECT id, name, description, release_date FROM sheets ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Sheet {
                id: r.get(0)?,
                name: r.get(1)?,
                description: r.get(2)?,
                release_date: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn sheet_id_by_name(conn: &Connection, name: &str) -> SyncResult<Option<i64>> {
    Ok(conn
        .query_row("SELECT id FROM sheets WHERE name = ?", [name], |r| r.get(0))
        .optional()?)
}

pub fn resolve_or_create_sheet(conn: &Connection, name: &str) -> SyncResult<i64> {
    if let Some(id) = sheet_id_by_name(conn, name)? {
        return Ok(id);
    }
    conn.execute("INSERT INTO sheets(name) VALUES(?)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn update_sheet_details(
    conn: &Connection,
    sheet_id: i64,
    description: Option<&str>,
    release_date: Option<&str>,
) -> SyncResult<()> {
    let changed = conn.execute(
        "UPDATE sheets SET description = ?, release_date = ? WHERE id = ?",
        (description, release_date, sheet_id),
    )?;
    if changed == 0 {
        return Err(SyncError::NotFound(format!("sheet {}", sheet_id)));
    }
    Ok(())
}

pub fn list_exercises(conn: &Connection, sheet_id: Option<i64>) -> SyncResult<Vec<Exercise>> {
    let mut stmt = conn.prepare(
        "SELECT id, sheet_id, code, title, max_points
         FROM exercises
         WHERE (?1 IS NULL OR sheet_id = ?1)
         ORDER BY sheet_id, code",
    )?;
    let rows = stmt
        .query_map([sheet_id], |r| {
            Ok(Exercise {
                id: r.get(0)?,
                sheet_id: r.get(1)?,
                code: r.get(2)?,
                title: r.get(3)?,
                max_points: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn resolve_or_create_exercise(conn: &Connection, sheet_id: i64, code: &str) -> SyncResult<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM exercises WHERE sheet_id = ? AND code = ?",
            (sheet_id, code),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO exercises(sheet_id, code) VALUES(?, ?)",
        (sheet_id, code),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_exercise_max_points(conn: &Connection, exercise_id: i64, max_points: f64) -> SyncResult<()> {
    if !max_points.is_finite() || max_points < 0.0 {
        return Err(SyncError::Validation(
            "max points must be a non-negative number".into(),
        ));
    }
    let changed = conn.execute(
        "UPDATE exercises SET max_points = ? WHERE id = ?",
        (max_points, exercise_id),
    )?;
    if changed == 0 {
        return Err(SyncError::NotFound(format!("exercise {}", exercise_id)));
    }
    Ok(())
}

/// Exercise code to configured maximum. Without a sheet filter, later sheets
/// win for codes shared across sheets.
pub fn exercise_max_points(
    conn: &Connection,
    sheet_id: Option<i64>,
) -> SyncResult<BTreeMap<String, f64>> {
    Ok(list_exercises(conn, sheet_id)?
        .into_iter()
        .map(|e| (e.code, e.max_points))
        .collect())
}
