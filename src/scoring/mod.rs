pub mod analyzer;
pub mod types;

pub use analyzer::{grade_answer, QuestionSheet, RoundScore};
pub use types::{AnswerSlot, AnswerStatus, QuestionResult};
