#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Starts `sifrd` with its data root at `data_root` and a converter that
/// does not exist, so no test depends on pandoc being installed.
pub fn spawn_sidecar(data_root: &Path) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_sifrd");
    let mut child = Command::new(exe)
        .env("SIFR_DATA_DIR", data_root)
        .env("SIFR_PDF_CONVERTER", "sifr-missing-converter")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sifrd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

pub fn request(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(sidecar.stdin, "{}", payload).expect("write request");
    sidecar.stdin.flush().expect("flush request");

    let mut line = String::new();
    sidecar
        .reader
        .read_line(&mut line)
        .expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(sidecar, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

/// `<data_root>/Sheet-1` with one roster-listed and one unlisted submission.
pub fn write_sheet_fixture(data_root: &Path) -> PathBuf {
    let root = data_root.join("Sheet-1");
    std::fs::create_dir_all(root.join("exercise-1").join("Alice_Bob_ABC123")).expect("mkdir");
    std::fs::create_dir_all(root.join("exercise-1").join("Carol_DEF456")).expect("mkdir");
    std::fs::write(
        root.join("exercise-1").join("Alice_Bob_ABC123").join("solution.pdf"),
        b"%PDF-1.4 alice",
    )
    .expect("write pdf");
    std::fs::write(
        root.join("marks.csv"),
        "submissionid,group,sheet,exercise,points,status\nABC123,Team AB,Sheet-1,exercise-1,,SUBMITTED\n",
    )
    .expect("write marks");
    root
}
