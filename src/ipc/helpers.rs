use rusqlite::Connection;
use std::path::PathBuf;

use crate::db;
use crate::error::SyncError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, SubmissionRecord};

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

/// Opens the grading database, runs `f` and turns its result into a response.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> HandlerResult,
{
    tracing::debug!(method = %req.method, "handling request");
    let result = db::open_db(&state.config.data_root)
        .map_err(HandlerErr::from)
        .and_then(|conn| f(&conn, &req.params));
    respond(req, result)
}

pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, "request failed: {}", e.message);
            e.response(&req.id)
        }
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Exercise filter param; the "all" sentinel and blanks mean no filter.
pub fn exercise_filter(params: &serde_json::Value) -> Option<String> {
    optional_str(params, "exerciseCode")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != store::ALL_EXERCISES)
}

/// `params.root`, else the root selected via `roots.select`.
pub fn sheet_root(conn: &Connection, params: &serde_json::Value) -> Result<PathBuf, HandlerErr> {
    if let Some(root) = optional_str(params, "root").filter(|s| !s.trim().is_empty()) {
        return Ok(PathBuf::from(root));
    }
    store::load_current_root(conn)?
        .map(PathBuf::from)
        .ok_or_else(|| HandlerErr::bad_params("missing root and no sheet root selected"))
}

pub fn to_json<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("failed to encode result: {}", e),
        details: None,
    })
}

pub fn require_submission(conn: &Connection, submission_id: i64) -> Result<SubmissionRecord, HandlerErr> {
    store::get_submission(conn, submission_id)?
        .ok_or_else(|| SyncError::NotFound(format!("submission {}", submission_id)).into())
}
