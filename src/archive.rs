//! Ingestion of gzip tar archives of submission folders into the data root.

use flate2::read::GzDecoder;
use serde::Serialize;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::scan::find_candidate_roots;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub extracted_to: PathBuf,
    pub entry_count: usize,
    pub candidate_roots: Vec<PathBuf>,
}

fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    for suffix in [".tar.gz", ".tgz", ".gz"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    name
}

fn open_archive(path: &Path) -> SyncResult<tar::Archive<GzDecoder<File>>> {
    let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

fn is_safe_entry_path(p: &Path) -> bool {
    p.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Rejects the whole archive if any entry would land outside the target.
fn check_entries(path: &Path) -> SyncResult<usize> {
    let mut archive = open_archive(path)?;
    let mut count = 0usize;
    let entries = archive
        .entries()
        .map_err(|e| SyncError::Archive(format!("cannot read archive: {}", e)))?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::Archive(format!("corrupt archive entry: {}", e)))?;
        let entry_path = entry
            .path()
            .map_err(|e| SyncError::Archive(format!("invalid entry path: {}", e)))?;
        if !is_safe_entry_path(&entry_path) {
            return Err(SyncError::Validation(format!(
                "archive entry escapes the extraction directory: {}",
                entry_path.to_string_lossy()
            )));
        }
        count += 1;
    }
    Ok(count)
}

fn fresh_target_dir(data_root: &Path, stem: &str) -> SyncResult<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base = format!("{}_{}", stem, stamp);
    let mut candidate = data_root.join(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = data_root.join(format!("{}_{}", base, n));
        n += 1;
    }
    std::fs::create_dir_all(&candidate).map_err(|e| SyncError::io(&candidate, e))?;
    Ok(candidate)
}

/// Extracts `archive_path` into `data_root/{stem}_{YYYYMMDD_HHMMSS}` and
/// returns the refreshed list of sheet roots under the data root.
pub fn extract_archive(archive_path: &Path, data_root: &Path) -> SyncResult<ArchiveSummary> {
    if !archive_path.is_file() {
        return Err(SyncError::NotFound(archive_path.to_string_lossy().to_string()));
    }
    let entry_count = check_entries(archive_path)?;

    let target = fresh_target_dir(data_root, &archive_stem(archive_path))?;
    let mut archive = open_archive(archive_path)?;
    let entries = archive
        .entries()
        .map_err(|e| SyncError::Archive(format!("cannot read archive: {}", e)))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| SyncError::Archive(format!("corrupt archive entry: {}", e)))?;
        let unpacked = entry
            .unpack_in(&target)
            .map_err(|e| SyncError::Archive(format!("cannot extract entry: {}", e)))?;
        if !unpacked {
            return Err(SyncError::Validation(
                "archive entry escapes the extraction directory".into(),
            ));
        }
    }

    tracing::info!(
        archive = %archive_path.to_string_lossy(),
        target = %target.to_string_lossy(),
        entry_count,
        "extracted archive"
    );

    Ok(ArchiveSummary {
        extracted_to: target,
        entry_count,
        candidate_roots: find_candidate_roots(data_root),
    })
}
