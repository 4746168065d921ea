use serde::{Deserialize, Serialize};

use crate::theory::degree::ScaleDegree;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Correct,
    Incorrect,
    Empty,
    InvalidFormat,
}

impl AnswerStatus {
    /// Whether the entry is a real answer, right or wrong.
    pub fn is_graded(self) -> bool {
        matches!(self, AnswerStatus::Correct | AnswerStatus::Incorrect)
    }
}

/// One melody note the user has to name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSlot {
    pub expected: ScaleDegree,
    /// Most recent entry, kept verbatim.
    pub entered: Option<String>,
    pub status: AnswerStatus,
    /// Outcome of the first graded entry; later entries never change it.
    pub first_attempt: Option<AnswerStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub expected_notes: usize,
    pub correct_first_attempts: usize,
    /// 0-100.
    pub score: f64,
}
