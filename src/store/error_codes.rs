use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::compose::format_deduction;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCode {
    pub id: i64,
    pub sheet_id: i64,
    pub code: String,
    pub description: String,
    pub deduction: f64,
    pub comment: Option<String>,
}

impl ErrorCode {
    /// Selection label, e.g. `FC1: Missing units (0.5 points)`.
    pub fn as_option(&self) -> String {
        format!(
            "{}: {} ({} points)",
            self.code,
            self.description,
            format_deduction(self.deduction)
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodeInput {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub deduction: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ErrorCodeInput {
    fn normalized(&self) -> SyncResult<(String, String, f64, Option<String>)> {
        let code = self.code.trim();
        let description = self.description.trim();
        if code.is_empty() || description.is_empty() {
            return Err(SyncError::Validation(
                "error code needs at least a code and a description".into(),
            ));
        }
        if !self.deduction.is_finite() || self.deduction < 0.0 {
            return Err(SyncError::Validation(
                "deduction must be a non-negative number".into(),
            ));
        }
        let comment = self
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok((code.to_string(), description.to_string(), self.deduction, comment))
    }
}

pub fn list_error_codes(conn: &Connection, sheet_id: i64) -> SyncResult<Vec<ErrorCode>> {
    let mut stmt = conn.prepare(
        "SELECT id, sheet_id, code, COALESCE(description, ''), deduction, comment
         FROM error_codes
         WHERE sheet_id = ?
         ORDER BY code",
    )?;
    let rows = stmt
        .query_map([sheet_id], |r| {
            Ok(ErrorCode {
                id: r.get(0)?,
                sheet_id: r.get(1)?,
                code: r.get(2)?,
                description: r.get(3)?,
                deduction: r.get(4)?,
                comment: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_code_id(conn: &Connection, sheet_id: i64, code: &str) -> SyncResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM error_codes WHERE sheet_id = ? AND code = ?",
            (sheet_id, code),
            |r| r.get(0),
        )
        .optional()?)
}

fn require_sheet(conn: &Connection, sheet_id: i64) -> SyncResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM sheets WHERE id = ?", [sheet_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(SyncError::NotFound(format!("sheet {}", sheet_id)));
    }
    Ok(())
}

pub fn add_error_code(conn: &Connection, sheet_id: i64, input: &ErrorCodeInput) -> SyncResult<ErrorCode> {
    let (code, description, deduction, comment) = input.normalized()?;
    require_sheet(conn, sheet_id)?;
    if find_code_id(conn, sheet_id, &code)?.is_some() {
        return Err(SyncError::Validation(format!(
            "error code {} already exists for this sheet",
            code
        )));
    }
    conn.execute(
        "INSERT INTO error_codes(sheet_id, code, description, deduction, comment)
         VALUES(?, ?, ?, ?, ?)",
        (sheet_id, &code, &description, deduction, &comment),
    )?;
    Ok(ErrorCode {
        id: conn.last_insert_rowid(),
        sheet_id,
        code,
        description,
        deduction,
        comment,
    })
}

/// Replaces the code identified by `(sheet_id, code)`; the code itself may be
/// renamed as long as it stays unique within the sheet.
pub fn update_error_code(
    conn: &Connection,
    sheet_id: i64,
    code: &str,
    input: &ErrorCodeInput,
) -> SyncResult<ErrorCode> {
    let (new_code, description, deduction, comment) = input.normalized()?;
    let Some(id) = find_code_id(conn, sheet_id, code)? else {
        return Err(SyncError::NotFound(format!("error code {}", code)));
    };
    if new_code != code && find_code_id(conn, sheet_id, &new_code)?.is_some() {
        return Err(SyncError::Validation(format!(
            "error code {} already exists for this sheet",
            new_code
        )));
    }
    conn.execute(
        "UPDATE error_codes SET code = ?, description = ?, deduction = ?, comment = ? WHERE id = ?",
        (&new_code, &description, deduction, &comment, id),
    )?;
    Ok(ErrorCode {
        id,
        sheet_id,
        code: new_code,
        description,
        deduction,
        comment,
    })
}

/// Deletes within one sheet only; the same code may exist on other sheets.
pub fn delete_error_code(conn: &Connection, sheet_id: i64, code: &str) -> SyncResult<bool> {
    let n = conn.execute(
        "DELETE FROM error_codes WHERE sheet_id = ? AND code = ?",
        (sheet_id, code),
    )?;
    Ok(n > 0)
}
