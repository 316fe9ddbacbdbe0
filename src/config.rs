//! Runtime configuration loaded from the environment.

use std::path::{Path, PathBuf};

use anyhow::Context;

pub const DATA_DIR_ENV: &str = "SIFR_DATA_DIR";
pub const PDF_CONVERTER_ENV: &str = "SIFR_PDF_CONVERTER";
pub const DEFAULT_PDF_CONVERTER: &str = "pandoc";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding extracted sheets and the grading database.
    pub data_root: PathBuf,
    /// Document converter binary used to typeset feedback PDFs.
    pub pdf_converter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let data_root = match std::env::var(DATA_DIR_ENV) {
            Ok(v) if !v.trim().is_empty() => absolutize(Path::new(v.trim()))?,
            _ => default_data_root()?,
        };
        let pdf_converter = std::env::var(PDF_CONVERTER_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PDF_CONVERTER.to_string());

        std::fs::create_dir_all(&data_root).with_context(|| {
            format!(
                "failed to create data directory {}",
                data_root.to_string_lossy()
            )
        })?;

        Ok(Config {
            data_root,
            pdf_converter,
        })
    }
}

// `~` and `~/...` resolve against `HOME`; other paths pass through.
fn expand_home(p: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return p.to_path_buf();
    };
    match p.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => p.to_path_buf(),
    }
}

fn absolutize(p: &Path) -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let p = expand_home(p, home.as_deref());
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(&p))
}

// `data/` beside the installed binary.
fn default_data_root() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to resolve executable path")?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_tilde_resolves_against_home() {
        let home = Path::new("/home/grader");
        assert_eq!(
            expand_home(Path::new("~/grading"), Some(home)),
            PathBuf::from("/home/grader/grading")
        );
        assert_eq!(expand_home(Path::new("~"), Some(home)), PathBuf::from("/home/grader"));
        assert_eq!(
            expand_home(Path::new("data/~x"), Some(home)),
            PathBuf::from("data/~x")
        );
        assert_eq!(
            expand_home(Path::new("~other/x"), Some(home)),
            PathBuf::from("~other/x")
        );
        assert_eq!(expand_home(Path::new("~/grading"), None), PathBuf::from("~/grading"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(
            absolutize(Path::new("/srv/sifr")).expect("absolutize"),
            PathBuf::from("/srv/sifr")
        );
    }
}
