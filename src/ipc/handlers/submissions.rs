use serde_json::json;
use std::path::Path;

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    exercise_filter, optional_i64, optional_str, require_submission, required_i64, to_json,
    with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::review::{self, SortMode};
use crate::scan;
use crate::store;

fn handle_submissions_list(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = optional_i64(params, "sheetId")?;
        let exercise_code = exercise_filter(params);
        let sort = match optional_str(params, "sort") {
            Some(s) => SortMode::parse(&s)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown sort mode: {}", s)))?,
            None => SortMode::default(),
        };

        let all = store::get_submissions(conn, sheet_id, None)?;
        let exercise_options = review::exercise_options(&all);
        let filtered = review::filter_by_exercise(all, exercise_code.as_deref());
        let mut rows = review::filter_by_search(
            filtered,
            optional_str(params, "search").as_deref().unwrap_or(""),
        );
        review::sort_submissions(&mut rows, sort);

        Ok(json!({
            "submissions": to_json(&rows)?,
            "exerciseOptions": exercise_options,
        }))
    })
}

fn handle_submissions_get(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission = require_submission(conn, required_i64(params, "submissionId")?)?;
        to_json(&submission)
    })
}

fn handle_submissions_files(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission = require_submission(conn, required_i64(params, "submissionId")?)?;
        let files = store::list_submission_files(conn, submission.id)?;
        Ok(json!({ "files": to_json(&files)? }))
    })
}

fn handle_submissions_pdfs(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission = require_submission(conn, required_i64(params, "submissionId")?)?;
        let candidates = scan::find_submission_pdfs(Path::new(&submission.path));
        let (valid, issues) = scan::classify_pdf_candidates(&candidates);
        Ok(json!({
            "pdfs": valid.iter().map(|p| p.to_string_lossy().to_string()).collect::<Vec<_>>(),
            "issues": to_json(&issues)?,
        }))
    })
}

fn handle_submissions_progress(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = optional_i64(params, "sheetId")?;
        let exercise_code = exercise_filter(params);
        let rows = store::get_submissions(conn, sheet_id, exercise_code.as_deref())?;
        to_json(&review::progress_stats(&rows))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.list" => Some(handle_submissions_list(state, req)),
        "submissions.get" => Some(handle_submissions_get(state, req)),
        "submissions.files" => Some(handle_submissions_files(state, req)),
        "submissions.pdfs" => Some(handle_submissions_pdfs(state, req)),
        "submissions.progress" => Some(handle_submissions_progress(state, req)),
        _ => None,
    }
}
