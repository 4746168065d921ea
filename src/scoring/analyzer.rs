use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::scoring::types::*;
use crate::theory::degree::{degree_from_note, ScaleDegree};
use crate::theory::notes::{NoteName, PitchClass};

/// `{b,#,bb,##}?[1-7]`, or the older `[1-7]{#,##}` spelling. Case sensitive.
fn parse_answer(token: &str) -> Option<ScaleDegree> {
    if !token.chars().all(|c| c == 'b' || c == '#' || ('1'..='7').contains(&c)) {
        return None;
    }
    token.parse().ok()
}

/// Grade one typed answer against the expected degree.
///
/// Spellings are compared by pitch, so `b3` and `2#` are the same answer.
pub fn grade_answer(entered: &str, expected: ScaleDegree) -> AnswerStatus {
    let token = entered.trim();
    if token.is_empty() {
        return AnswerStatus::Empty;
    }
    match parse_answer(token) {
        None => AnswerStatus::InvalidFormat,
        Some(degree) if degree == expected => AnswerStatus::Correct,
        Some(_) => AnswerStatus::Incorrect,
    }
}

/// Answer slots for one played melody.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuestionSheet {
    slots: Vec<AnswerSlot>,
}

impl QuestionSheet {
    pub fn new(expected: Vec<ScaleDegree>) -> Self {
        let slots = expected
            .into_iter()
            .map(|expected| AnswerSlot {
                expected,
                entered: None,
                status: AnswerStatus::Empty,
                first_attempt: None,
            })
            .collect();
        QuestionSheet { slots }
    }

    pub fn for_melody(melody: &[NoteName], key: PitchClass) -> Self {
        Self::new(
            melody
                .iter()
                .map(|note| degree_from_note(note.pitch_class(), key))
                .collect(),
        )
    }

    pub fn slots(&self) -> &[AnswerSlot] {
        &self.slots
    }

    pub fn submit(&mut self, index: usize, entered: &str) -> Result<AnswerStatus, GenerationError> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            GenerationError::InvalidInput(format!("answer slot {} is outside 0-{}", index, len))
        })?;
        let status = grade_answer(entered, slot.expected);
        slot.entered = Some(entered.to_string());
        slot.status = status;
        if slot.first_attempt.is_none() && status.is_graded() {
            slot.first_attempt = Some(status);
        }
        Ok(status)
    }

    /// Every slot currently holds the right answer.
    pub fn is_solved(&self) -> bool {
        self.slots.iter().all(|s| s.status == AnswerStatus::Correct)
    }

    pub fn result(&self) -> QuestionResult {
        let expected_notes = self.slots.len();
        let correct_first_attempts = self
            .slots
            .iter()
            .filter(|s| s.first_attempt == Some(AnswerStatus::Correct))
            .count();
        let score = if expected_notes == 0 {
            0.0
        } else {
            correct_first_attempts as f64 / expected_notes as f64 * 100.0
        };
        QuestionResult {
            expected_notes,
            correct_first_attempts,
            score,
        }
    }
}

/// Question scores collected over one round.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub question_scores: Vec<f64>,
}

impl RoundScore {
    pub fn record(&mut self, result: &QuestionResult) {
        self.question_scores.push(result.score);
    }

    pub fn len(&self) -> usize {
        self.question_scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.question_scores.is_empty()
    }

    pub fn mean_score(&self) -> f64 {
        if self.question_scores.is_empty() {
            return 0.0;
        }
        self.question_scores.iter().sum::<f64>() / self.question_scores.len() as f64
    }

    /// Round accuracy in 0-1, as reported to the progression engine.
    pub fn accuracy(&self) -> f64 {
        (self.mean_score() / 100.0).clamp(0.0, 1.0)
    }
}
