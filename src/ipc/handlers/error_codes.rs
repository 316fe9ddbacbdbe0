use serde_json::json;

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_i64, required_str, to_json, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, ErrorCodeInput};

fn input_param(params: &serde_json::Value) -> Result<ErrorCodeInput, HandlerErr> {
    let raw = params
        .get("errorCode")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing errorCode"))?;
    serde_json::from_value(raw).map_err(|e| HandlerErr::bad_params(format!("invalid errorCode: {}", e)))
}

fn handle_error_codes_list(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let codes = store::list_error_codes(conn, sheet_id)?;
        let options: Vec<String> = codes.iter().map(|c| c.as_option()).collect();
        Ok(json!({
            "errorCodes": to_json(&codes)?,
            "options": options,
        }))
    })
}

fn handle_error_codes_add(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let input = input_param(params)?;
        let code = store::add_error_code(conn, sheet_id, &input)?;
        to_json(&code)
    })
}

fn handle_error_codes_update(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let code = required_str(params, "code")?;
        let input = input_param(params)?;
        let updated = store::update_error_code(conn, sheet_id, &code, &input)?;
        to_json(&updated)
    })
}

fn handle_error_codes_delete(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let sheet_id = required_i64(params, "sheetId")?;
        let code = required_str(params, "code")?;
        let deleted = store::delete_error_code(conn, sheet_id, &code)?;
        Ok(json!({ "deleted": deleted }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "errorCodes.list" => Some(handle_error_codes_list(state, req)),
        "errorCodes.add" => Some(handle_error_codes_add(state, req)),
        "errorCodes.update" => Some(handle_error_codes_update(state, req)),
        "errorCodes.delete" => Some(handle_error_codes_delete(state, req)),
        _ => None,
    }
}
