use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::roster::{Roster, MARKS_FILE};

// `excercise-` is a historical misspelling that existing rosters rely on.
const EXERCISE_PREFIXES: [&str; 2] = ["exercise-", "excercise-"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub filename: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct SubmissionInventory {
    pub files: Vec<DiscoveredFile>,
    /// SHA-256 over relative paths and contents, hex encoded.
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct DiscoveredSubmission {
    pub path: PathBuf,
    pub group_name: String,
    pub submission_id: String,
    pub submitter: String,
    pub exercise_code: String,
    /// `None` when the directory could not be inventoried.
    pub inventory: Option<SubmissionInventory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub root: PathBuf,
    pub sheet_name: String,
    pub exercises: Vec<String>,
    pub submissions: Vec<DiscoveredSubmission>,
    pub issues: Vec<ScanIssue>,
    unlisted_dirs: Vec<PathBuf>,
}

impl ScanReport {
    /// True if `path` lies beneath a directory the scan could not list, in
    /// which case its absence from `submissions` says nothing.
    pub fn is_unlisted(&self, path: &Path) -> bool {
        self.unlisted_dirs.iter().any(|d| path.starts_with(d))
    }
}

pub fn is_exercise_dir_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXERCISE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// `Alice_Bob_ABC123` -> `ABC123`; names without `_` are the id themselves.
pub fn submission_id_from_dir_name(name: &str) -> &str {
    name.rsplit('_').next().unwrap_or(name)
}

pub fn sheet_name_for_root(root: &Path) -> String {
    root.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// Lists everything currently discoverable under a sheet root. Read-only.
pub fn scan_sheet_root(root: &Path, roster: &Roster) -> SyncResult<ScanReport> {
    let root = root.canonicalize().map_err(|e| SyncError::io(root, e))?;
    if !root.is_dir() {
        return Err(SyncError::NotFound(format!(
            "sheet root is not a directory: {}",
            root.to_string_lossy()
        )));
    }

    let mut report = ScanReport {
        sheet_name: sheet_name_for_root(&root),
        root: root.clone(),
        exercises: Vec::new(),
        submissions: Vec::new(),
        issues: Vec::new(),
        unlisted_dirs: Vec::new(),
    };

    let exercise_dirs = sorted_subdirs(&root).map_err(|e| SyncError::io(&root, e))?;
    for (exercise_code, exercise_path) in exercise_dirs {
        if !is_exercise_dir_name(&exercise_code) {
            continue;
        }
        report.exercises.push(exercise_code.clone());

        let submission_dirs = match sorted_subdirs(&exercise_path) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    path = %exercise_path.to_string_lossy(),
                    "cannot list exercise directory: {}",
                    e
                );
                report.issues.push(ScanIssue {
                    path: exercise_path.clone(),
                    reason: format!("cannot list directory: {}", e),
                });
                report.unlisted_dirs.push(exercise_path);
                continue;
            }
        };

        for (group_name, path) in submission_dirs {
            let submission_id = submission_id_from_dir_name(&group_name).to_string();
            let submitter = roster.display_name(&submission_id, &group_name);
            let inventory = match inventory_submission(&path) {
                Ok(v) => Some(v),
                Err(e) => {
                    report.issues.push(ScanIssue {
                        path: path.clone(),
                        reason: format!("cannot inventory submission: {}", e),
                    });
                    None
                }
            };
            report.submissions.push(DiscoveredSubmission {
                path,
                group_name,
                submission_id,
                submitter,
                exercise_code: exercise_code.clone(),
                inventory,
            });
        }
    }

    Ok(report)
}

fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for ent in std::fs::read_dir(dir)? {
        let ent = ent?;
        let p = ent.path();
        if !p.is_dir() {
            continue;
        }
        let name = ent.file_name().to_string_lossy().to_string();
        out.push((name, p));
    }
    out.sort();
    Ok(out)
}

pub fn inventory_submission(dir: &Path) -> std::io::Result<SubmissionInventory> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.0.relative_path.cmp(&b.0.relative_path));

    let mut hasher = Sha256::new();
    for (file, abs) in &files {
        hasher.update(file.relative_path.as_bytes());
        hasher.update([0u8]);
        let mut f = std::fs::File::open(abs)?;
        let mut buf = [0u8; 8192];
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(SubmissionInventory {
        files: files.into_iter().map(|(f, _)| f).collect(),
        fingerprint: format!("{:x}", hasher.finalize()),
    })
}

fn collect_files(
    base: &Path,
    dir: &Path,
    out: &mut Vec<(DiscoveredFile, PathBuf)>,
) -> std::io::Result<()> {
    for ent in std::fs::read_dir(dir)? {
        let ent = ent?;
        let ft = ent.file_type()?;
        let p = ent.path();
        if ft.is_dir() {
            collect_files(base, &p, out)?;
            continue;
        }
        if !ft.is_file() {
            continue;
        }
        let rel = p
            .strip_prefix(base)
            .unwrap_or(&p)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        let filename = ent.file_name().to_string_lossy().to_string();
        let size_bytes = ent.metadata()?.len();
        out.push((
            DiscoveredFile {
                mime_type: guess_mime(&filename),
                filename,
                relative_path: rel,
                size_bytes,
            },
            p,
        ));
    }
    Ok(())
}

fn guess_mime(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "tex" => "application/x-tex",
        "py" => "text/x-python",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Immediate sub-directories of `parent` that look like sheet roots.
pub fn find_candidate_roots(parent: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(parent) else {
        return Vec::new();
    };

    let mut out = BTreeSet::new();
    for ent in entries.flatten() {
        let item = ent.path();
        if !item.is_dir() {
            continue;
        }
        // Permission errors on a single directory are not fatal.
        let Ok(children) = std::fs::read_dir(&item) else {
            continue;
        };
        let has_marks = item.join(MARKS_FILE).exists();
        let has_exercises = children.flatten().any(|c| {
            c.path().is_dir() && is_exercise_dir_name(&c.file_name().to_string_lossy())
        });
        if has_marks || has_exercises {
            out.insert(item.canonicalize().unwrap_or(item));
        }
    }
    out.into_iter().collect()
}

pub fn find_submission_pdfs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    out.sort();
    out
}

/// Splits candidates into readable PDFs and `(path, reason)` issues.
pub fn classify_pdf_candidates(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<ScanIssue>) {
    let mut valid = Vec::new();
    let mut issues = Vec::new();
    for p in paths {
        let reason = if !p.exists() {
            Some("file not found".to_string())
        } else if !p.is_file() {
            Some("path is not a file".to_string())
        } else {
            match read_header(p) {
                Ok(h) if h.len() == 4 && h.starts_with(b"%PDF") => None,
                Ok(_) => Some("file has no PDF header".to_string()),
                Err(e) => Some(format!("file could not be read: {}", e)),
            }
        };
        match reason {
            Some(reason) => {
                tracing::warn!(path = %p.to_string_lossy(), "skipping pdf: {}", reason);
                issues.push(ScanIssue {
                    path: p.clone(),
                    reason,
                });
            }
            None => valid.push(p.clone()),
        }
    }
    (valid, issues)
}

fn read_header(p: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = std::fs::File::open(p)?;
    let mut buf = Vec::with_capacity(4);
    f.by_ref().take(4).read_to_end(&mut buf)?;
    Ok(buf)
}
