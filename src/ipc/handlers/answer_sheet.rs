use serde_json::json;
use std::path::PathBuf;

use crate::ipc::helpers::{optional_str, required_i64, required_str, sheet_root, to_json, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store;

const DEFAULT_TOGGLE_PREFIX: &str = "review";

fn handle_answer_sheet_status(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        to_json(&store::answer_sheet_status(conn, sheet_id)?)
    })
}

fn handle_answer_sheet_save(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let source = PathBuf::from(required_str(params, "sourcePath")?);
        let root = sheet_root(conn, params)?;
        to_json(&store::store_answer_sheet(conn, sheet_id, &root, &source)?)
    })
}

fn handle_answer_sheet_delete(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        to_json(&store::remove_answer_sheet(conn, sheet_id)?)
    })
}

/// Sets the visibility preference when `visible` is given, then returns the
/// effective value.
fn handle_answer_sheet_toggle(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let prefix = optional_str(params, "prefix").unwrap_or_else(|| DEFAULT_TOGGLE_PREFIX.to_string());
        if let Some(visible) = params.get("visible").and_then(|v| v.as_bool()) {
            store::set_answer_sheet_toggle(conn, &prefix, sheet_id, visible)?;
        }
        let has_answer_sheet = store::answer_sheet_status(conn, sheet_id)?
            .effective_path()
            .is_some();
        let visible = store::answer_sheet_toggle(conn, &prefix, sheet_id, has_answer_sheet)?;
        Ok(json!({
            "visible": visible,
            "hasAnswerSheet": has_answer_sheet,
        }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "answerSheet.status" => Some(handle_answer_sheet_status(state, req)),
        "answerSheet.save" => Some(handle_answer_sheet_save(state, req)),
        "answerSheet.delete" => Some(handle_answer_sheet_delete(state, req)),
        "answerSheet.toggle" => Some(handle_answer_sheet_toggle(state, req)),
        _ => None,
    }
}
