use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::compose::format_points;

const NO_COMMENTS: &str = "_No comments recorded._";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutcome {
    pub success: bool,
    pub message: String,
}

impl RenderOutcome {
    fn ok(output: &Path) -> Self {
        RenderOutcome {
            success: true,
            message: format!("PDF written to {}", output.to_string_lossy()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        RenderOutcome {
            success: false,
            message: message.into(),
        }
    }
}

pub fn feedback_pdf_path(submission_dir: &Path, group_name: &str) -> PathBuf {
    submission_dir.join(format!("feedback_{}.pdf", group_name))
}

/// First run of ASCII digits in `text`, e.g. `Sheet-12` -> `12`.
pub fn first_number(text: &str) -> String {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        "unknown".to_string()
    } else {
        digits
    }
}

pub fn compose_feedback_document(
    markdown: &str,
    name: &str,
    points: f64,
    sheet_number: &str,
    exercise_number: &str,
) -> String {
    let comments = markdown.trim();
    let comments = if comments.is_empty() {
        NO_COMMENTS
    } else {
        comments
    };
    format!(
        "\n# Feedback for sheet {sheet_number}, exercise {exercise_number}\n\n\
**Name:** {name}  \n\
**Points:** **{points}**\n\n\
---\n\n\
$$\\underline{{\\textbf{{COMMENTS}}}}$$\n\n\
{comments}\n\n\
---\n",
        points = format_points(points),
    )
}

fn classify_failure(converter: &str, stderr: &str, code: Option<i32>) -> String {
    let lower = stderr.to_lowercase();
    if lower.contains("latex") {
        return format!("LaTeX engine error: {}", stderr.trim());
    }
    match code {
        Some(c) => format!("conversion failed ({} exited with {}): {}", converter, c, stderr.trim()),
        None => format!("conversion failed ({} was terminated): {}", converter, stderr.trim()),
    }
}

/// Runs the document converter on `document`, writing `output`.
///
/// Never returns an error; every failure is described in the outcome.
pub fn render_feedback_pdf(converter: &str, document: &str, output: &Path) -> RenderOutcome {
    let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return RenderOutcome::failed("output path has no parent directory");
    };
    if !dir.is_dir() {
        return RenderOutcome::failed(format!(
            "output directory {} does not exist",
            dir.to_string_lossy()
        ));
    }

    let temp_md = output.with_extension("md");
    if let Err(e) = std::fs::write(&temp_md, document) {
        return RenderOutcome::failed(format!(
            "failed to write {}: {}",
            temp_md.to_string_lossy(),
            e
        ));
    }

    let result = Command::new(converter)
        .arg(&temp_md)
        .arg("-o")
        .arg(output)
        .args([
            "--pdf-engine=xelatex",
            "-V",
            "geometry:margin=2.5cm",
            "-V",
            "fontsize=12pt",
            "-V",
            "mainfont=DejaVuSerif",
            "-V",
            "monofont=DejaVuSansMono",
        ])
        .output();
    let _ = std::fs::remove_file(&temp_md);

    let outcome = match result {
        Err(e) if e.kind() == ErrorKind::NotFound => RenderOutcome::failed(format!(
            "converter '{}' not found; install pandoc or set SIFR_PDF_CONVERTER",
            converter
        )),
        Err(e) => RenderOutcome::failed(format!("failed to run {}: {}", converter, e)),
        Ok(out) if !out.status.success() => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            RenderOutcome::failed(classify_failure(converter, &stderr, out.status.code()))
        }
        Ok(_) if !output.is_file() => RenderOutcome::failed(format!(
            "conversion failed: {} produced no output",
            converter
        )),
        Ok(_) => RenderOutcome::ok(output),
    };
    if !outcome.success {
        tracing::warn!(output = %output.to_string_lossy(), "{}", outcome.message);
    }
    outcome
}
