use serde_json::json;

use crate::ipc::helpers::{
    exercise_filter, optional_i64, required_i64, required_str, require_submission, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::review;
use crate::store;

fn handle_state_get(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let key = required_str(params, "key")?;
        Ok(json!({ "value": store::load_grader_state(conn, &key)? }))
    })
}

fn handle_state_set(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let key = required_str(params, "key")?;
        let value = required_str(params, "value")?;
        store::save_grader_state(conn, &key, &value)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_state_delete(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let key = required_str(params, "key")?;
        store::delete_grader_state(conn, &key)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_review_current(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = optional_i64(params, "sheetId")?;
        let exercise_code = exercise_filter(params);
        let ids: Vec<i64> = store::get_submissions(conn, sheet_id, exercise_code.as_deref())?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let current = store::resolve_current_submission(conn, &ids)?;
        let position = ids.iter().position(|id| *id == current).unwrap_or(0);
        Ok(json!({
            "submissionId": current,
            "position": position,
            "total": ids.len(),
        }))
    })
}

fn handle_review_set_current(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let submission = require_submission(conn, required_i64(params, "submissionId")?)?;
        store::set_current_submission_id(conn, submission.id)?;
        Ok(json!({ "submissionId": submission.id }))
    })
}

fn handle_review_step(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let delta = required_i64(params, "delta")?;
        let sheet_id = optional_i64(params, "sheetId")?;
        let exercise_code = exercise_filter(params);
        let id = store::step_current_submission(conn, delta, sheet_id, exercise_code.as_deref())?;
        Ok(json!({ "submissionId": id }))
    })
}

fn handle_review_filter_get(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = optional_i64(params, "sheetId")?;
        let options = review::exercise_options(&store::get_submissions(conn, sheet_id, None)?);
        let value = store::load_exercise_filter(conn, &options)?;
        Ok(json!({
            "value": value,
            "options": options,
        }))
    })
}

fn handle_review_filter_set(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let value = required_str(params, "value")?;
        store::save_exercise_filter(conn, value.trim())?;
        Ok(json!({ "value": value.trim() }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "state.get" => Some(handle_state_get(state, req)),
        "state.set" => Some(handle_state_set(state, req)),
        "state.delete" => Some(handle_state_delete(state, req)),
        "review.current" => Some(handle_review_current(state, req)),
        "review.setCurrent" => Some(handle_review_set_current(state, req)),
        "review.step" => Some(handle_review_step(state, req)),
        "review.filter.get" => Some(handle_review_filter_get(state, req)),
        "review.filter.set" => Some(handle_review_filter_set(state, req)),
        _ => None,
    }
}
