mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir, Sidecar};

fn step(sidecar: &mut Sidecar, id: &str, delta: i64, exercise: &str) -> i64 {
    request_ok(
        sidecar,
        id,
        "review.step",
        json!({ "delta": delta, "exerciseCode": exercise }),
    )
    .get("submissionId")
    .and_then(|v| v.as_i64())
    .expect("submissionId")
}

#[test]
fn step_filter_and_current_persist_across_requests() {
    let data = temp_dir("sifr-review");
    let root = data.join("Sheet-2");
    for (exercise, group) in [
        ("exercise-1", "Ann_A1"),
        ("exercise-1", "Ben_B2"),
        ("exercise-2", "Cid_C3"),
    ] {
        let dir = root.join(exercise).join(group);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("answer.txt"), group).expect("write");
    }
    let mut sidecar = spawn_sidecar(&data);

    let empty = request(&mut sidecar, "0", "review.current", json!({}));
    assert_eq!(error_code(&empty), Some("not_found"));

    request_ok(
        &mut sidecar,
        "1",
        "roots.select",
        json!({ "path": root.to_string_lossy() }),
    );
    request_ok(&mut sidecar, "2", "sheets.scan", json!({}));

    let current = request_ok(&mut sidecar, "3", "review.current", json!({}));
    let first = current.get("submissionId").and_then(|v| v.as_i64()).expect("id");
    assert_eq!(current.get("position"), Some(&json!(0)));
    assert_eq!(current.get("total"), Some(&json!(3)));

    let second = step(&mut sidecar, "4", 1, "all");
    assert_ne!(second, first);
    // Clamped at the end of the exercise-1 subset.
    let still_second = step(&mut sidecar, "5", 5, "exercise-1");
    assert_eq!(still_second, second);
    let back = step(&mut sidecar, "6", -9, "exercise-1");
    assert_eq!(back, first);

    let filter = request_ok(&mut sidecar, "7", "review.filter.get", json!({}));
    assert_eq!(filter.get("value"), Some(&json!("all")));
    assert_eq!(
        filter.get("options"),
        Some(&json!(["exercise-1", "exercise-2"]))
    );
    request_ok(&mut sidecar, "8", "review.filter.set", json!({ "value": "exercise-2" }));
    let filter = request_ok(&mut sidecar, "9", "review.filter.get", json!({}));
    assert_eq!(filter.get("value"), Some(&json!("exercise-2")));

    // The current submission is outside exercise-2, so the subset's first wins.
    let current = request_ok(
        &mut sidecar,
        "10",
        "review.current",
        json!({ "exerciseCode": "exercise-2" }),
    );
    assert_eq!(current.get("total"), Some(&json!(1)));
    assert_eq!(current.get("position"), Some(&json!(0)));

    let missing = request(&mut sidecar, "11", "review.setCurrent", json!({ "submissionId": 999 }));
    assert_eq!(error_code(&missing), Some("not_found"));
}

#[test]
fn answer_sheet_toggle_falls_back_when_sheet_is_missing() {
    let data = temp_dir("sifr-answer-sheet");
    let root = data.join("Sheet-3");
    std::fs::create_dir_all(root.join("exercise-1").join("Dee_D4")).expect("mkdir");
    let source = data.join("solutions.pdf");
    std::fs::write(&source, b"%PDF-1.4 solutions").expect("write");
    let mut sidecar = spawn_sidecar(&data);

    let summary = request_ok(
        &mut sidecar,
        "1",
        "sheets.scan",
        json!({ "root": root.to_string_lossy() }),
    );
    let sheet_id = summary.get("sheetId").cloned().expect("sheetId");

    let toggle = request_ok(
        &mut sidecar,
        "2",
        "answerSheet.toggle",
        json!({ "sheetId": sheet_id, "visible": true }),
    );
    assert_eq!(toggle.get("visible"), Some(&json!(false)));
    assert_eq!(toggle.get("hasAnswerSheet"), Some(&json!(false)));

    request_ok(
        &mut sidecar,
        "3",
        "answerSheet.save",
        json!({
            "sheetId": sheet_id,
            "sourcePath": source.to_string_lossy(),
            "root": root.to_string_lossy(),
        }),
    );
    assert!(root.join("answer_sheet.pdf").is_file());

    let toggle = request_ok(
        &mut sidecar,
        "4",
        "answerSheet.toggle",
        json!({ "sheetId": sheet_id, "visible": true }),
    );
    assert_eq!(toggle.get("visible"), Some(&json!(true)));
    assert_eq!(toggle.get("hasAnswerSheet"), Some(&json!(true)));

    request_ok(&mut sidecar, "5", "answerSheet.delete", json!({ "sheetId": sheet_id }));
    assert!(!root.join("answer_sheet.pdf").exists());
    let status = request_ok(&mut sidecar, "6", "answerSheet.status", json!({ "sheetId": sheet_id }));
    assert_eq!(status.get("existsOnDisk"), Some(&json!(false)));
}
