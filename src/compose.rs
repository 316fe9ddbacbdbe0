//! Pure transforms from selected deductions to points and feedback markdown.

use crate::error::{SyncError, SyncResult};
use crate::store::ErrorCode;

/// Applies the selected error codes in order to a running point total.
///
/// Each entry may be a bare code or a selection label `CODE: text`. Unknown
/// codes are skipped. Points never drop below zero.
pub fn apply_error_codes(
    selected: &[String],
    available: &[ErrorCode],
    current_points: f64,
    current_markdown: &str,
) -> (f64, String) {
    let mut points = current_points;
    let mut markdown = current_markdown.to_string();

    for label in selected {
        let code = label.split(':').next().unwrap_or_default().trim();
        let Some(ec) = available.iter().find(|e| e.code == code) else {
            continue;
        };
        points = (points - ec.deduction).max(0.0);
        if let Some(comment) = ec.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            markdown.push_str(&format!(
                "\n\n### {}: -{}P\n{}",
                ec.description,
                format_deduction(ec.deduction),
                comment
            ));
        }
    }
    (points, markdown)
}

/// Free-form deduction entered by the grader.
pub fn apply_manual_deduction(
    description: &str,
    deduction: f64,
    comment: &str,
    current_points: f64,
    current_markdown: &str,
) -> SyncResult<(f64, String)> {
    let description = description.trim();
    if description.is_empty() {
        return Err(SyncError::Validation("description is required".into()));
    }
    if !deduction.is_finite() || deduction <= 0.0 {
        return Err(SyncError::Validation(
            "deduction must be greater than zero".into(),
        ));
    }

    let points = (current_points - deduction).max(0.0);
    let mut markdown = current_markdown.to_string();
    markdown.push_str(&format!(
        "\n\n### {}: -{}P",
        description,
        format_deduction(deduction)
    ));
    let comment = comment.trim();
    if !comment.is_empty() {
        markdown.push('\n');
        markdown.push_str(comment);
    }
    Ok((points, markdown))
}

/// Two decimals with trailing zeros and a dangling dot removed.
pub fn format_points(points: f64) -> String {
    let s = format!("{:.2}", points);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Deduction with at most six significant digits and no trailing zeros:
/// `0.5`, `2`, `0.3` for `0.1 + 0.2`.
pub fn format_deduction(deduction: f64) -> String {
    if !deduction.is_finite() {
        return deduction.to_string();
    }
    if deduction == 0.0 {
        return "0".to_string();
    }
    let magnitude = deduction.abs().log10().floor() as i32;
    let decimals = (5 - magnitude).clamp(0, 15) as usize;
    let s = format!("{:.*}", decimals, deduction);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    match s {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
