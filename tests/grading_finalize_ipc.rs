mod test_support;

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir, write_sheet_fixture, Sidecar};

fn scan_and_find(sidecar: &mut Sidecar, root: &std::path::Path, external_id: &str) -> (i64, i64) {
    let summary = request_ok(
        sidecar,
        "scan",
        "sheets.scan",
        json!({ "root": root.to_string_lossy() }),
    );
    let sheet_id = summary.get("sheetId").and_then(|v| v.as_i64()).expect("sheetId");
    let listed = request_ok(sidecar, "list", "submissions.list", json!({ "sheetId": sheet_id }));
    let id = listed
        .get("submissions")
        .and_then(|v| v.as_array())
        .and_then(|subs| {
            subs.iter().find(|s| {
                s.get("groupName").and_then(|v| v.as_str()).map(|g| g.ends_with(external_id))
                    == Some(true)
            })
        })
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_i64())
        .expect("submission id");
    (sheet_id, id)
}

#[test]
fn finalize_writes_feedback_status_and_marks_row() {
    let data = temp_dir("sifr-finalize");
    let root = write_sheet_fixture(&data);
    let mut sidecar = spawn_sidecar(&data);
    let (_, alice) = scan_and_find(&mut sidecar, &root, "ABC123");

    let result = request_ok(
        &mut sidecar,
        "f1",
        "grading.finalize",
        json!({
            "submissionId": alice,
            "points": 7.5,
            "markdown": "Solid proof.",
            "renderPdf": false,
        }),
    );
    assert_eq!(result.get("marksUpdated"), Some(&json!(true)));
    assert_eq!(result.get("render"), Some(&json!(null)));
    assert_eq!(
        result.pointer("/feedback/markdownContent").and_then(|v| v.as_str()),
        Some("Solid proof.")
    );

    let marks = std::fs::read_to_string(root.join("marks.csv")).expect("read marks");
    assert_eq!(
        marks,
        "submissionid,group,sheet,exercise,points,status\nABC123,Team AB,Sheet-1,exercise-1,7.5,FINAL_MARK\n"
    );

    let sub = request_ok(&mut sidecar, "g", "submissions.get", json!({ "submissionId": alice }));
    assert_eq!(sub.get("status").and_then(|v| v.as_str()), Some("FINAL_MARK"));

    request_ok(
        &mut sidecar,
        "f2",
        "grading.finalize",
        json!({
            "submissionId": alice,
            "points": 8,
            "markdown": "Solid proof, regraded.",
            "renderPdf": false,
        }),
    );
    let history = request_ok(
        &mut sidecar,
        "h",
        "feedback.history",
        json!({ "submissionId": alice }),
    );
    let history = history.get("history").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].get("points").and_then(|v| v.as_f64()), Some(7.5));

    let marks = std::fs::read_to_string(root.join("marks.csv")).expect("read marks");
    assert!(marks.contains("ABC123,Team AB,Sheet-1,exercise-1,8,FINAL_MARK"));
}

#[test]
fn failed_render_and_unlisted_marks_row_still_save_feedback() {
    let data = temp_dir("sifr-finalize-fail");
    let root = write_sheet_fixture(&data);
    let mut sidecar = spawn_sidecar(&data);
    let (_, carol) = scan_and_find(&mut sidecar, &root, "DEF456");
    let marks_before = std::fs::read_to_string(root.join("marks.csv")).expect("read marks");

    let result = request_ok(
        &mut sidecar,
        "f",
        "grading.finalize",
        json!({ "submissionId": carol, "points": 3, "markdown": "Missing part b." }),
    );
    assert_eq!(result.pointer("/render/success"), Some(&json!(false)));
    assert!(result
        .pointer("/render/message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .contains("not found"));
    assert_eq!(result.get("marksUpdated"), Some(&json!(false)));
    assert_eq!(result.pointer("/feedback/pdfPath"), Some(&json!(null)));

    let stored = request_ok(&mut sidecar, "get", "feedback.get", json!({ "submissionId": carol }));
    assert_eq!(stored.pointer("/feedback/points").and_then(|v| v.as_f64()), Some(3.0));
    let marks_after = std::fs::read_to_string(root.join("marks.csv")).expect("read marks");
    assert_eq!(marks_before, marks_after);
}

#[test]
fn error_codes_feed_deductions_into_feedback_text() {
    let data = temp_dir("sifr-error-codes");
    let root = write_sheet_fixture(&data);
    let mut sidecar = spawn_sidecar(&data);
    let (sheet_id, _) = scan_and_find(&mut sidecar, &root, "ABC123");

    request_ok(
        &mut sidecar,
        "a",
        "errorCodes.add",
        json!({
            "sheetId": sheet_id,
            "errorCode": {
                "code": "E1",
                "description": "Missing base case",
                "deduction": 2,
                "comment": "Induction needs a base case."
            }
        }),
    );
    let listed = request_ok(&mut sidecar, "l", "errorCodes.list", json!({ "sheetId": sheet_id }));
    let option = listed
        .pointer("/options/0")
        .and_then(|v| v.as_str())
        .expect("option")
        .to_string();
    assert_eq!(option, "E1: Missing base case (2 points)");

    let applied = request_ok(
        &mut sidecar,
        "ap",
        "feedback.applyErrorCodes",
        json!({
            "sheetId": sheet_id,
            "codes": [option, "NOPE"],
            "points": 10,
            "markdown": "Overall fine.",
        }),
    );
    assert_eq!(applied.get("points").and_then(|v| v.as_f64()), Some(8.0));
    assert_eq!(
        applied.get("markdown").and_then(|v| v.as_str()),
        Some("Overall fine.\n\n### Missing base case: -2P\nInduction needs a base case.")
    );

    let manual = request_ok(
        &mut sidecar,
        "m",
        "feedback.applyManual",
        json!({
            "description": "Sloppy notation",
            "deduction": 0.5,
            "points": 8,
            "markdown": "",
        }),
    );
    assert_eq!(manual.get("points").and_then(|v| v.as_f64()), Some(7.5));
    assert_eq!(
        manual.get("markdown").and_then(|v| v.as_str()),
        Some("\n\n### Sloppy notation: -0.5P")
    );
}
