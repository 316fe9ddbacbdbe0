use serde_json::json;
use std::path::PathBuf;

use crate::archive;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{optional_str, required_str, respond, to_json, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::scan;
use crate::store;

fn handle_health(state: &AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataRoot": state.config.data_root.to_string_lossy(),
            "pdfConverter": state.config.pdf_converter,
        }),
    )
}

fn handle_roots_list(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let parent = optional_str(params, "parent")
            .map(PathBuf::from)
            .unwrap_or_else(|| state.config.data_root.clone());
        let roots: Vec<serde_json::Value> = scan::find_candidate_roots(&parent)
            .into_iter()
            .map(|p| {
                json!({
                    "path": p.to_string_lossy(),
                    "name": scan::sheet_name_for_root(&p),
                })
            })
            .collect();
        Ok(json!({
            "roots": roots,
            "current": store::load_current_root(conn)?,
        }))
    })
}

fn handle_roots_select(state: &AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let path = PathBuf::from(required_str(params, "path")?);
        let root = path
            .canonicalize()
            .map_err(|e| HandlerErr::from(crate::error::SyncError::io(&path, e)))?;
        if !root.is_dir() {
            return Err(HandlerErr::bad_params("path is not a directory"));
        }
        let root_str = root.to_string_lossy().to_string();
        store::save_current_root(conn, &root_str)?;
        let sheet_name = scan::sheet_name_for_root(&root);
        Ok(json!({
            "root": root_str,
            "sheetName": sheet_name,
            "sheetId": store::sheet_id_by_name(conn, &sheet_name)?,
        }))
    })
}

fn handle_archive_extract(state: &AppState, req: &Request) -> serde_json::Value {
    let result = required_str(&req.params, "path").and_then(|path| {
        let summary = archive::extract_archive(&PathBuf::from(path), &state.config.data_root)?;
        to_json(&summary)
    });
    respond(req, result)
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "roots.list" => Some(handle_roots_list(state, req)),
        "roots.select" => Some(handle_roots_select(state, req)),
        "archive.extract" => Some(handle_archive_extract(state, req)),
        _ => None,
    }
}
