use serde_json::json;

use crate::ipc::helpers::{
    optional_i64, optional_str, required_f64, required_i64, sheet_root, to_json, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::reconcile;
use crate::store;

fn handle_sheets_scan(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let root = sheet_root(conn, params)?;
        let summary = reconcile::reconcile_sheet(conn, &root)?;
        to_json(&summary)
    })
}

fn handle_sheets_list(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, _| {
        let sheets = store::list_sheets(conn)?;
        Ok(json!({ "sheets": to_json(&sheets)? }))
    })
}

fn handle_sheets_update(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let description = optional_str(params, "description");
        let release_date = optional_str(params, "releaseDate");
        store::update_sheet_details(
            conn,
            sheet_id,
            description.as_deref(),
            release_date.as_deref(),
        )?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_exercises_list(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = optional_i64(params, "sheetId")?;
        let exercises = store::list_exercises(conn, sheet_id)?;
        Ok(json!({
            "exercises": to_json(&exercises)?,
            "maxPoints": store::exercise_max_points(conn, sheet_id)?,
        }))
    })
}

fn handle_exercises_set_max_points(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let exercise_id = required_i64(params, "exerciseId")?;
        let max_points = required_f64(params, "maxPoints")?;
        store::set_exercise_max_points(conn, exercise_id, max_points)?;
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sheets.scan" => Some(handle_sheets_scan(state, req)),
        "sheets.list" => Some(handle_sheets_list(state, req)),
        "sheets.update" => Some(handle_sheets_update(state, req)),
        "exercises.list" => Some(handle_exercises_list(state, req)),
        "exercises.setMaxPoints" => Some(handle_exercises_set_max_points(state, req)),
        _ => None,
    }
}
