//! Merges what is on disk under a sheet root into the grading database.
//!
//! A pass is one transaction: the sheet and its exercises are resolved,
//! discovered submissions are inserted or refreshed, and rows whose directory
//! vanished are pruned. Grading status is owned by the grader and is never
//! touched here.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::SyncResult;
use crate::roster::load_roster_for_root;
use crate::scan::{scan_sheet_root, DiscoveredSubmission, ScanIssue};
use crate::store::{resolve_or_create_exercise, resolve_or_create_sheet, SubmissionStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub sheet_id: i64,
    pub sheet_name: String,
    pub root: PathBuf,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub issues: Vec<ScanIssue>,
}

struct ExistingRow {
    id: i64,
    status: SubmissionStatus,
    group_name: Option<String>,
    submitter: Option<String>,
    exercise_id: Option<i64>,
    external_id: Option<String>,
    file_hash: Option<String>,
}

pub fn reconcile_sheet(conn: &Connection, root: &Path) -> SyncResult<ReconcileSummary> {
    let roster = load_roster_for_root(root)?;
    if roster.is_empty() {
        tracing::debug!(root = %root.to_string_lossy(), "no roster entries; using folder names");
    } else {
        tracing::debug!(entries = roster.len(), "loaded roster");
    }
    // Read-only; a missing root fails here before anything is written.
    let report = scan_sheet_root(root, &roster)?;

    let tx = conn.unchecked_transaction()?;

    let sheet_id = resolve_or_create_sheet(&tx, &report.sheet_name)?;
    let snapshot = snapshot_submissions(&tx, sheet_id)?;

    let mut exercise_ids: HashMap<String, i64> = HashMap::new();
    for code in &report.exercises {
        let id = resolve_or_create_exercise(&tx, sheet_id, code)?;
        exercise_ids.insert(code.clone(), id);
    }

    let mut inserted = 0usize;
    let mut updated = 0usize;
    let mut unchanged = 0usize;
    let mut discovered: HashSet<String> = HashSet::new();

    for sub in &report.submissions {
        let path = sub.path.to_string_lossy().to_string();
        let exercise_id = exercise_ids.get(&sub.exercise_code).copied();
        discovered.insert(path.clone());

        match snapshot.get(&path) {
            Some(row) => {
                let mut changed = false;
                if row.group_name.as_deref() != Some(sub.group_name.as_str())
                    || row.submitter.as_deref() != Some(sub.submitter.as_str())
                    || row.exercise_id != exercise_id
                    || row.external_id.as_deref() != Some(sub.submission_id.as_str())
                {
                    tx.execute(
                        "UPDATE submissions
                         SET group_name = ?, submitter = ?, exercise_id = ?, external_id = ?
                         WHERE id = ?",
                        (
                            &sub.group_name,
                            &sub.submitter,
                            exercise_id,
                            &sub.submission_id,
                            row.id,
                        ),
                    )?;
                    changed = true;
                }
                if refresh_files(&tx, row.id, row.file_hash.as_deref(), sub)? {
                    changed = true;
                }
                if changed {
                    tracing::debug!(submission_id = row.id, status = %row.status, "refreshed submission");
                    updated += 1;
                } else {
                    unchanged += 1;
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO submissions(external_id, sheet_id, exercise_id, group_name, submitter, path, status)
                     VALUES(?, ?, ?, ?, ?, ?, ?)",
                    (
                        &sub.submission_id,
                        sheet_id,
                        exercise_id,
                        &sub.group_name,
                        &sub.submitter,
                        &path,
                        SubmissionStatus::Submitted,
                    ),
                )?;
                let id = tx.last_insert_rowid();
                refresh_files(&tx, id, None, sub)?;
                inserted += 1;
            }
        }
    }

    let mut removed = 0usize;
    for (path, row) in &snapshot {
        if discovered.contains(path) || report.is_unlisted(Path::new(path)) {
            continue;
        }
        tx.execute("DELETE FROM submissions WHERE id = ?", [row.id])?;
        removed += 1;
    }

    tx.commit()?;

    tracing::info!(
        sheet = %report.sheet_name,
        inserted,
        updated,
        unchanged,
        removed,
        issues = report.issues.len(),
        "reconciled sheet root"
    );

    Ok(ReconcileSummary {
        sheet_id,
        sheet_name: report.sheet_name,
        root: report.root,
        inserted,
        updated,
        unchanged,
        removed,
        issues: report.issues,
    })
}

fn snapshot_submissions(conn: &Connection, sheet_id: i64) -> SyncResult<BTreeMap<String, ExistingRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, status, group_name, submitter, exercise_id, external_id, file_hash
         FROM submissions
         WHERE sheet_id = ?",
    )?;
    let rows = stmt
        .query_map([sheet_id], |r| {
            let path: Option<String> = r.get(1)?;
            Ok((
                path.unwrap_or_default(),
                ExistingRow {
                    id: r.get(0)?,
                    status: r.get(2)?,
                    group_name: r.get(3)?,
                    submitter: r.get(4)?,
                    exercise_id: r.get(5)?,
                    external_id: r.get(6)?,
                    file_hash: r.get(7)?,
                },
            ))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}

/// Replaces the file inventory when the fingerprint moved. Returns whether
/// anything was written.
fn refresh_files(
    conn: &Connection,
    submission_id: i64,
    stored_hash: Option<&str>,
    sub: &DiscoveredSubmission,
) -> SyncResult<bool> {
    let Some(inv) = sub.inventory.as_ref() else {
        return Ok(false);
    };
    if stored_hash == Some(inv.fingerprint.as_str()) {
        return Ok(false);
    }

    conn.execute("DELETE FROM files WHERE submission_id = ?", [submission_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO files(submission_id, filename, relative_path, size_bytes, mime_type)
         VALUES(?, ?, ?, ?, ?)",
    )?;
    for f in &inv.files {
        stmt.execute((
            submission_id,
            &f.filename,
            &f.relative_path,
            f.size_bytes as i64,
            f.mime_type,
        ))?;
    }
    conn.execute(
        "UPDATE submissions SET file_count = ?, file_hash = ? WHERE id = ?",
        (inv.files.len() as i64, &inv.fingerprint, submission_id),
    )?;
    Ok(true)
}
