//! Typed access layer over the grading database.
//!
//! Every function takes a borrowed connection; callers open one per logical
//! operation. Records are built once here and handed out as plain structs.

mod answer_sheets;
mod error_codes;
mod feedback;
mod grader_state;
mod sheets;
mod submissions;

pub use answer_sheets::{
    answer_sheet_status, answer_sheet_toggle, remove_answer_sheet, set_answer_sheet_toggle,
    store_answer_sheet, AnswerSheetStatus,
};
pub use error_codes::{
    add_error_code, delete_error_code, list_error_codes, update_error_code, ErrorCode,
    ErrorCodeInput,
};
pub use feedback::{
    get_feedback, list_feedback_history, save_feedback_with_submission, Feedback,
    FeedbackHistoryEntry,
};
pub use grader_state::{
    delete_grader_state, load_current_root, load_exercise_filter, load_grader_state,
    resolve_current_submission, save_current_root, save_exercise_filter, save_grader_state,
    set_current_submission_id, step_current_submission, ALL_EXERCISES,
};
pub use sheets::{
    exercise_max_points, list_exercises, list_sheets, resolve_or_create_exercise,
    resolve_or_create_sheet, set_exercise_max_points, sheet_id_by_name, update_sheet_details,
    Exercise, Sheet,
};
pub use submissions::{
    get_submission, get_submissions, list_submission_files, SubmissionFile, SubmissionRecord,
    SubmissionStatus,
};
