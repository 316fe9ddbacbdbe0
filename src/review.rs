use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::store::{SubmissionRecord, SubmissionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    ById,
    Alphabetical,
    OpenFirst,
    DoneFirst,
}

impl SortMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" | "byId" => Some(SortMode::ById),
            "alphabetical" | "name" => Some(SortMode::Alphabetical),
            "openFirst" => Some(SortMode::OpenFirst),
            "doneFirst" => Some(SortMode::DoneFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: usize,
    pub corrected: usize,
    pub status_counts: BTreeMap<String, usize>,
}

pub fn exercise_options(records: &[SubmissionRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.exercise_code.is_empty())
        .map(|r| r.exercise_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn filter_by_exercise(
    records: Vec<SubmissionRecord>,
    exercise_code: Option<&str>,
) -> Vec<SubmissionRecord> {
    match exercise_code {
        Some(code) => records
            .into_iter()
            .filter(|r| r.exercise_code == code)
            .collect(),
        None => records,
    }
}

/// Case-insensitive substring match on submitter or group name.
pub fn filter_by_search(records: Vec<SubmissionRecord>, query: &str) -> Vec<SubmissionRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            r.submitter.to_lowercase().contains(&needle)
                || r.group_name.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn sort_submissions(records: &mut [SubmissionRecord], mode: SortMode) {
    match mode {
        SortMode::ById => records.sort_by_key(|r| r.id),
        SortMode::Alphabetical => {
            records.sort_by(|a, b| {
                a.submitter
                    .to_lowercase()
                    .cmp(&b.submitter.to_lowercase())
                    .then(a.id.cmp(&b.id))
            });
        }
        SortMode::OpenFirst => records.sort_by_key(|r| (r.status.is_completed(), r.id)),
        SortMode::DoneFirst => records.sort_by_key(|r| (!r.status.is_completed(), r.id)),
    }
}

pub fn progress_stats(records: &[SubmissionRecord]) -> ProgressStats {
    let mut status_counts = BTreeMap::new();
    for s in SubmissionStatus::ALL {
        status_counts.insert(s.as_str().to_string(), 0);
    }
    let mut corrected = 0;
    for r in records {
        *status_counts.entry(r.status.as_str().to_string()).or_insert(0) += 1;
        if r.status.is_completed() {
            corrected += 1;
        }
    }
    ProgressStats {
        total: records.len(),
        corrected,
        status_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, submitter: &str, code: &str, status: SubmissionStatus) -> SubmissionRecord {
        SubmissionRecord {
            id,
            sheet_id: 1,
            exercise_id: Some(1),
            exercise_code: code.to_string(),
            external_id: None,
            path: format!("/tmp/{}", id),
            group_name: format!("{}_{}", submitter, id),
            submitter: submitter.to_string(),
            status,
            file_count: 0,
        }
    }

    fn sample() -> Vec<SubmissionRecord> {
        vec![
            record(3, "carol", "exercise-2", SubmissionStatus::FinalMark),
            record(1, "Bob", "exercise-1", SubmissionStatus::Submitted),
            record(2, "alice", "exercise-1", SubmissionStatus::ProvisionalMark),
            record(4, "Dave", "exercise-2", SubmissionStatus::Sick),
        ]
    }

    fn ids(records: &[SubmissionRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn sorting_modes() {
        let mut r = sample();
        sort_submissions(&mut r, SortMode::ById);
        assert_eq!(ids(&r), vec![1, 2, 3, 4]);
        sort_submissions(&mut r, SortMode::Alphabetical);
        assert_eq!(ids(&r), vec![2, 1, 3, 4]);
        sort_submissions(&mut r, SortMode::OpenFirst);
        assert_eq!(ids(&r), vec![1, 4, 2, 3]);
        sort_submissions(&mut r, SortMode::DoneFirst);
        assert_eq!(ids(&r), vec![2, 3, 1, 4]);
        assert_eq!(SortMode::parse("doneFirst"), Some(SortMode::DoneFirst));
        assert_eq!(SortMode::parse("random"), None);
    }

    #[test]
    fn filters_and_options() {
        assert_eq!(exercise_options(&sample()), vec!["exercise-1", "exercise-2"]);
        assert_eq!(ids(&filter_by_exercise(sample(), Some("exercise-2"))), vec![3, 4]);
        assert_eq!(filter_by_exercise(sample(), None).len(), 4);
        assert_eq!(ids(&filter_by_search(sample(), "ALI")), vec![2]);
        assert_eq!(ids(&filter_by_search(sample(), "dave_4")), vec![4]);
        assert_eq!(filter_by_search(sample(), "  ").len(), 4);
    }

    #[test]
    fn progress_counts_completed_statuses() {
        let stats = progress_stats(&sample());
        assert_eq!(stats.total, 4);
        assert_eq!(stats.corrected, 2);
        assert_eq!(stats.status_counts["SICK"], 1);
        assert_eq!(stats.status_counts["ABSEND"], 0);
    }
}
