pub mod answer_sheet;
pub mod core;
pub mod error_codes;
pub mod feedback;
pub mod sheets;
pub mod state;
pub mod submissions;
