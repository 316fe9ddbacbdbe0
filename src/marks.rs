use serde::Serialize;
use std::path::Path;

use crate::compose::format_points;
use crate::error::{SyncError, SyncResult};
use crate::roster::MARKS_FILE;
use crate::store::SubmissionStatus;

const FIELD_COUNT: usize = 6;
const POINTS_FIELD: usize = 4;
const STATUS_FIELD: usize = 5;

/// One data row of `marks.csv` as shown in the marks overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksRow {
    pub submission_id: String,
    pub group: String,
    pub sheet: String,
    pub exercise: String,
    pub points: String,
    pub status: String,
}

// A parsed record and the byte span of its text, terminator excluded.
struct RawRecord {
    fields: csv::StringRecord,
    start: usize,
    end: usize,
}

fn read_bytes(path: &Path) -> SyncResult<Vec<u8>> {
    if !path.is_file() {
        return Err(SyncError::NotFound(path.to_string_lossy().to_string()));
    }
    std::fs::read(path).map_err(|e| SyncError::io(path, e))
}

fn is_line_break(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

fn parse_records(bytes: &[u8]) -> SyncResult<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut out = Vec::new();
    let mut fields = csv::StringRecord::new();
    loop {
        let before = reader.position().byte() as usize;
        if !reader.read_record(&mut fields)? {
            break;
        }
        let mut start = fields
            .position()
            .map(|p| p.byte() as usize)
            .unwrap_or(before);
        let mut end = (reader.position().byte() as usize).min(bytes.len());
        // Blank lines and the terminator sit outside the record text.
        while start < end && is_line_break(bytes[start]) {
            start += 1;
        }
        while end > start && is_line_break(bytes[end - 1]) {
            end -= 1;
        }
        out.push(RawRecord {
            fields: fields.clone(),
            start,
            end,
        });
    }
    Ok(out)
}

fn encode_row(path: &Path, fields: &[String]) -> SyncResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let mut line = writer
        .into_inner()
        .map_err(|e| SyncError::io(path, e.into_error()))?;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(line)
}

/// Writes the grade of one submission into `root/marks.csv`.
///
/// Only the bytes of the matched row change. Every other row, blank line and
/// line terminator is written back exactly as read.
pub fn update_marks_csv(
    root: &Path,
    submission_id: &str,
    points: f64,
    status: SubmissionStatus,
) -> SyncResult<()> {
    let path = root.join(MARKS_FILE);
    let bytes = read_bytes(&path)?;
    let records = parse_records(&bytes)?;

    let Some(row) = records
        .iter()
        .skip(1)
        .find(|r| r.fields.get(0) == Some(submission_id))
    else {
        return Err(SyncError::Validation(format!(
            "submission {} is not listed in {}",
            submission_id, MARKS_FILE
        )));
    };

    let mut fields: Vec<String> = row.fields.iter().map(str::to_string).collect();
    if fields.len() < FIELD_COUNT {
        fields.resize(FIELD_COUNT, String::new());
    }
    fields[POINTS_FIELD] = format_points(points);
    fields[STATUS_FIELD] = status.as_str().to_string();

    let mut out = Vec::with_capacity(bytes.len() + 16);
    out.extend_from_slice(&bytes[..row.start]);
    out.extend_from_slice(&encode_row(&path, &fields)?);
    out.extend_from_slice(&bytes[row.end..]);
    std::fs::write(&path, out).map_err(|e| SyncError::io(&path, e))?;

    tracing::info!(
        root = %root.to_string_lossy(),
        submission_id,
        status = %status,
        "updated marks.csv"
    );
    Ok(())
}

/// Data rows of `root/marks.csv`, header skipped, short rows padded.
pub fn read_marks_rows(root: &Path) -> SyncResult<Vec<MarksRow>> {
    let records = parse_records(&read_bytes(&root.join(MARKS_FILE))?)?;
    Ok(records
        .iter()
        .skip(1)
        .map(|raw| {
            let r = &raw.fields;
            let field = |i: usize| r.get(i).unwrap_or_default().to_string();
            MarksRow {
                submission_id: field(0),
                group: field(1),
                sheet: field(2),
                exercise: field(3),
                points: field(POINTS_FIELD),
                status: field(STATUS_FIELD),
            }
        })
        .collect())
}
