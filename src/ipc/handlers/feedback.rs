use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::compose;
use crate::error::SyncError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    optional_str, require_submission, required_f64, required_i64, required_str, respond,
    sheet_root, to_json, with_conn, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::marks;
use crate::render;
use crate::scan;
use crate::store::{self, SubmissionRecord, SubmissionStatus};

fn status_param(params: &serde_json::Value, fallback: SubmissionStatus) -> Result<SubmissionStatus, HandlerErr> {
    match optional_str(params, "status") {
        Some(s) => SubmissionStatus::parse(&s)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", s))),
        None => Ok(fallback),
    }
}

fn markdown_param(params: &serde_json::Value) -> String {
    optional_str(params, "markdown").unwrap_or_default()
}

fn handle_feedback_get(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission_id = required_i64(params, "submissionId")?;
        let feedback = store::get_feedback(conn, submission_id)?;
        Ok(json!({ "feedback": to_json(&feedback)? }))
    })
}

fn handle_feedback_save(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission_id = required_i64(params, "submissionId")?;
        let status = status_param(params, SubmissionStatus::ProvisionalMark)?;
        let points = required_f64(params, "points")?;
        let pdf_path = optional_str(params, "pdfPath");
        let feedback = store::save_feedback_with_submission(
            conn,
            submission_id,
            status,
            points,
            &markdown_param(params),
            pdf_path.as_deref(),
        )?;
        to_json(&feedback)
    })
}

fn handle_feedback_history(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission_id = required_i64(params, "submissionId")?;
        let history = store::list_feedback_history(conn, submission_id)?;
        Ok(json!({ "history": to_json(&history)? }))
    })
}

fn handle_feedback_apply_error_codes(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let selected: Vec<String> = params
            .get("codes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| HandlerErr::bad_params("missing codes"))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let points = required_f64(params, "points")?;
        let available = store::list_error_codes(conn, sheet_id)?;
        let (points, markdown) =
            compose::apply_error_codes(&selected, &available, points, &markdown_param(params));
        Ok(json!({ "points": points, "markdown": markdown }))
    })
}

fn apply_manual(params: &serde_json::Value) -> HandlerResult {
    let description = required_str(params, "description")?;
    let deduction = required_f64(params, "deduction")?;
    let points = required_f64(params, "points")?;
    let comment = optional_str(params, "comment").unwrap_or_default();
    let (points, markdown) = compose::apply_manual_deduction(
        &description,
        deduction,
        &comment,
        points,
        &markdown_param(params),
    )?;
    Ok(json!({ "points": points, "markdown": markdown }))
}

fn handle_feedback_apply_manual(_state: &AppState, req: &Request) -> serde_json::Value {
    respond(req, apply_manual(&req.params))
}

// Submissions live at `<root>/<exercise>/<submission>`.
fn root_of_submission(submission: &SubmissionRecord) -> Option<PathBuf> {
    Path::new(&submission.path)
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
}

fn sheet_name(conn: &Connection, sheet_id: i64) -> Result<String, HandlerErr> {
    Ok(store::list_sheets(conn)?
        .into_iter()
        .find(|s| s.id == sheet_id)
        .map(|s| s.name)
        .unwrap_or_default())
}

/// Renders the feedback PDF, stores feedback and status, then writes the
/// grade to `marks.csv`. A failed render or marks update is reported in the
/// result; the feedback is saved either way.
fn handle_grading_finalize(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission = require_submission(conn, required_i64(params, "submissionId")?)?;
        let status = status_param(params, SubmissionStatus::FinalMark)?;
        let points = required_f64(params, "points")?;
        if !points.is_finite() || points < 0.0 {
            return Err(SyncError::Validation("points must be a non-negative number".into()).into());
        }
        let markdown = markdown_param(params);
        let render_pdf = params
            .get("renderPdf")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let render_outcome = if render_pdf {
            let output = render::feedback_pdf_path(Path::new(&submission.path), &submission.group_name);
            let document = render::compose_feedback_document(
                &markdown,
                &submission.submitter,
                points,
                &render::first_number(&sheet_name(conn, submission.sheet_id)?),
                &render::first_number(&submission.exercise_code),
            );
            let outcome = render::render_feedback_pdf(&state.config.pdf_converter, &document, &output);
            let pdf_path = outcome.success.then(|| output.to_string_lossy().to_string());
            Some((outcome, pdf_path))
        } else {
            None
        };
        let pdf_path = render_outcome.as_ref().and_then(|(_, p)| p.clone());

        let feedback = store::save_feedback_with_submission(
            conn,
            submission.id,
            status,
            points,
            &markdown,
            pdf_path.as_deref(),
        )?;

        let external_id = submission
            .external_id
            .clone()
            .unwrap_or_else(|| scan::submission_id_from_dir_name(&submission.group_name).to_string());
        let marks_result = match root_of_submission(&submission) {
            Some(root) => marks::update_marks_csv(&root, &external_id, points, status),
            None => Err(SyncError::NotFound(format!("sheet root of {}", submission.path))),
        };
        let (marks_updated, marks_message) = match marks_result {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::warn!(submission_id = submission.id, "marks.csv not updated: {}", e);
                (false, Some(e.to_string()))
            }
        };

        Ok(json!({
            "feedback": to_json(&feedback)?,
            "render": to_json(&render_outcome.map(|(o, _)| o))?,
            "marksUpdated": marks_updated,
            "marksMessage": marks_message,
        }))
    })
}

fn handle_marks_update(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let root = sheet_root(conn, params)?;
        let submission_id = required_str(params, "submissionId")?;
        let points = required_f64(params, "points")?;
        let status = status_param(params, SubmissionStatus::FinalMark)?;
        marks::update_marks_csv(&root, &submission_id, points, status)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_marks_rows(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let root = sheet_root(conn, params)?;
        let rows = marks::read_marks_rows(&root)?;
        Ok(json!({ "rows": to_json(&rows)? }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedback.get" => Some(handle_feedback_get(state, req)),
        "feedback.save" => Some(handle_feedback_save(state, req)),
        "feedback.history" => Some(handle_feedback_history(state, req)),
        "feedback.applyErrorCodes" => Some(handle_feedback_apply_error_codes(state, req)),
        "feedback.applyManual" => Some(handle_feedback_apply_manual(state, req)),
        "grading.finalize" => Some(handle_grading_finalize(state, req)),
        "marks.update" => Some(handle_marks_update(state, req)),
        "marks.rows" => Some(handle_marks_rows(state, req)),
        _ => None,
    }
}
