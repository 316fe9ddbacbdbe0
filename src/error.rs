use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error kinds surfaced by the synchronizer and the grading store.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("io error at {}: {source}", path.to_string_lossy())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("archive error: {0}")]
    Archive(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        // A missing path is a recoverable NotFound, not an IO failure.
        if source.kind() == std::io::ErrorKind::NotFound {
            return SyncError::NotFound(path.as_ref().to_string_lossy().to_string());
        }
        SyncError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// IPC error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "not_found",
            SyncError::Validation(_) => "validation",
            SyncError::Io { .. } => "io_failed",
            SyncError::Database(_) => "db_failed",
            SyncError::Csv(_) => "csv_failed",
            SyncError::Archive(_) => "archive_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_maps_to_not_found() {
        let err = SyncError::io(
            "/nowhere/marks.csv",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "not found: /nowhere/marks.csv");
    }

    #[test]
    fn permission_error_stays_io() {
        let err = SyncError::io(
            "/locked",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.code(), "io_failed");
        assert!(err.to_string().starts_with("io error at /locked"));
    }

    #[test]
    fn validation_variant_format() {
        let err = SyncError::Validation("no row for ABC".into());
        assert_eq!(err.to_string(), "validation failed: no row for ABC");
    }
}
