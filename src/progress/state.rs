use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bounded_vec_deque::BoundedVecDeque;
use serde::{Deserialize, Serialize};

use crate::config::ProgressionConfig;
use crate::error::GenerationError;
use crate::theory::degree::{parse_degree_list, ScaleDegree};

/// Most recent accuracies kept per exercise.
pub const HISTORY_CAPACITY: usize = 100;

/// A set of scale degrees identifying one exercise family, written `(1,3,5)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(Vec<ScaleDegree>);

impl GroupId {
    /// Canonical form: sorted by offset, duplicates removed.
    pub fn new(mut degrees: Vec<ScaleDegree>) -> Self {
        degrees.sort();
        degrees.dedup();
        GroupId(degrees)
    }

    pub fn degrees(&self) -> &[ScaleDegree] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Degree tokens as accepted by the melody generator's note filter.
    pub fn tokens(&self) -> Vec<String> {
        self.0.iter().map(|d| d.to_string()).collect()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.tokens().join(","))
    }
}

impl FromStr for GroupId {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = parse_degree_list(s).unwrap_or_default();
        if tokens.is_empty() {
            return Err(GenerationError::InvalidDegree(s.to_string()));
        }
        let degrees = tokens
            .iter()
            .map(|t| t.parse::<ScaleDegree>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupId::new(degrees))
    }
}

impl TryFrom<String> for GroupId {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupId> for String {
    fn from(value: GroupId) -> Self {
        value.to_string()
    }
}

/// FIFO ring of recent accuracies; the oldest entry is evicted first.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct AccuracyHistory(BoundedVecDeque<f64>);

impl AccuracyHistory {
    pub fn push(&mut self, accuracy: f64) {
        self.0.push_back(accuracy);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.iter().copied().collect()
    }
}

impl Default for AccuracyHistory {
    fn default() -> Self {
        AccuracyHistory(BoundedVecDeque::new(HISTORY_CAPACITY))
    }
}

impl From<Vec<f64>> for AccuracyHistory {
    fn from(values: Vec<f64>) -> Self {
        let mut history = AccuracyHistory::default();
        for value in values {
            history.push(value);
        }
        history
    }
}

impl From<AccuracyHistory> for Vec<f64> {
    fn from(history: AccuracyHistory) -> Self {
        history.to_vec()
    }
}

impl PartialEq for AccuracyHistory {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

/// Progress of one melody length within a group.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseState {
    #[serde(rename = "currentTempoBPM", alias = "currentBPM")]
    pub current_tempo_bpm: u32,
    #[serde(default, alias = "accuracyLastAttempt")]
    pub last_accuracy: Option<f64>,
    pub is_graduated: bool,
    #[serde(alias = "unlocked")]
    pub is_unlocked: bool,
    #[serde(default)]
    pub accuracy_history: AccuracyHistory,
}

impl ExerciseState {
    /// Fresh, unlocked state at the starting tempo.
    pub fn unlocked(rules: &ProgressionConfig) -> Self {
        ExerciseState {
            current_tempo_bpm: rules.min_tempo,
            last_accuracy: None,
            is_graduated: false,
            is_unlocked: true,
            accuracy_history: AccuracyHistory::default(),
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.is_unlocked && !self.is_graduated
    }

    /// Apply one attempt: speed up on success, log the accuracy, and
    /// graduate once the tempo ceiling is reached.
    pub fn record_attempt(&mut self, accuracy: f64, rules: &ProgressionConfig) {
        if accuracy >= rules.success_threshold && self.current_tempo_bpm < rules.max_tempo {
            self.current_tempo_bpm = self
                .current_tempo_bpm
                .saturating_add(rules.tempo_step)
                .min(rules.max_tempo);
        }
        self.last_accuracy = Some(accuracy);
        self.accuracy_history.push(accuracy);
        self.is_graduated = self.current_tempo_bpm >= rules.max_tempo;
    }

    /// Pull a stored state back inside the configured tempo range.
    pub fn normalize(&mut self, rules: &ProgressionConfig) {
        self.current_tempo_bpm = self.current_tempo_bpm.clamp(rules.min_tempo, rules.max_tempo);
        self.is_graduated = self.current_tempo_bpm >= rules.max_tempo;
    }
}

/// Per-melody-length states keyed by melody length.
pub type ExerciseStates = BTreeMap<u32, ExerciseState>;

/// Progress for one (user, context, group).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupProgressRecord {
    pub id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub context: String,
    #[serde(rename = "groupID")]
    pub group_id: GroupId,
    pub level: u32,
    pub exercise_states: ExerciseStates,
    pub is_active: bool,
    /// Milliseconds since the Unix epoch.
    pub last_practiced_at: u64,
    /// Bumped by the store on every update.
    pub version: u64,
}

impl GroupProgressRecord {
    pub fn eligible(&self) -> impl Iterator<Item = (u32, &ExerciseState)> {
        self.exercise_states
            .iter()
            .filter(|(_, state)| state.is_eligible())
            .map(|(length, state)| (*length, state))
    }
}
