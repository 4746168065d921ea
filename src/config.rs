// Tunable parameters for exercise generation and progression.
//
// `TrainerConfig` is plain serde data with a default for every field, so a
// host can pass a partial JSON object and get the stock behaviour for the
// rest. Nothing in `progress/` or `exercises/generators.rs` hard-codes these
// numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rhythm::{Duration, MAX_NOTE_COUNT};
use crate::theory::degree::ScaleDegree;
use crate::theory::notes::{NoteName, PitchClass};

/// Degree pool and level ceiling for one practice context (e.g. "major").
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    pub base_degrees: Vec<ScaleDegree>,
    pub max_level: u32,
}

impl ContextConfig {
    pub fn major() -> Self {
        ContextConfig {
            base_degrees: (1..=7).filter_map(ScaleDegree::diatonic).collect(),
            max_level: 6,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressionConfig {
    pub min_tempo: u32,
    pub max_tempo: u32,
    pub tempo_step: u32,
    /// Accuracy at or above which an attempt speeds the exercise up.
    pub success_threshold: f64,
    /// Tempo at which the next melody length of the same group unlocks.
    pub unlock_tempo: u32,
    pub initial_melody_length: u32,
    pub max_melody_length: u32,
    pub contexts: BTreeMap<String, ContextConfig>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert("major".to_string(), ContextConfig::major());
        ProgressionConfig {
            min_tempo: 60,
            max_tempo: 180,
            tempo_step: 5,
            success_threshold: 0.8,
            unlock_tempo: 100,
            initial_melody_length: 2,
            max_melody_length: 12,
            contexts,
        }
    }
}

impl ProgressionConfig {
    pub fn context(&self, name: &str) -> Option<&ContextConfig> {
        self.contexts.get(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExerciseSettings {
    pub key: PitchClass,
    pub range: (NoteName, NoteName),
    pub total_beats: f64,
    pub beats_per_measure: u32,
    pub shortest_duration: Duration,
    pub longest_duration: Duration,
    pub allow_rests: bool,
    pub rest_probability: f64,
    pub max_interval: Option<u32>,
    pub min_interval: Option<u32>,
    pub questions_per_round: usize,
}

impl Default for ExerciseSettings {
    fn default() -> Self {
        ExerciseSettings {
            key: PitchClass::new(0),
            // C3 and C5
            range: (NoteName::from_midi(48), NoteName::from_midi(72)),
            total_beats: 4.0,
            beats_per_measure: 4,
            shortest_duration: Duration::Sixteenth,
            longest_duration: Duration::Quarter,
            allow_rests: true,
            rest_probability: 0.2,
            max_interval: Some(12),
            min_interval: Some(1),
            questions_per_round: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainerConfig {
    pub progression: ProgressionConfig,
    pub exercise: ExerciseSettings,
}

impl TrainerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TrainerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.progression;
        if p.min_tempo == 0 || p.min_tempo > p.max_tempo {
            return Err(ConfigError::Invalid(format!(
                "tempo range {}-{} is empty",
                p.min_tempo, p.max_tempo
            )));
        }
        if p.tempo_step == 0 {
            return Err(ConfigError::Invalid("tempo step must be positive".to_string()));
        }
        if p.max_tempo > p.min_tempo && p.tempo_step > p.max_tempo - p.min_tempo {
            return Err(ConfigError::Invalid(format!(
                "tempo step {} exceeds the tempo range {}-{}",
                p.tempo_step, p.min_tempo, p.max_tempo
            )));
        }
        if !(p.min_tempo..=p.max_tempo).contains(&p.unlock_tempo) {
            return Err(ConfigError::Invalid(format!(
                "unlock tempo {} is outside {}-{}",
                p.unlock_tempo, p.min_tempo, p.max_tempo
            )));
        }
        if !(0.0..=1.0).contains(&p.success_threshold) {
            return Err(ConfigError::Invalid(format!(
                "success threshold {} is outside 0-1",
                p.success_threshold
            )));
        }
        if p.initial_melody_length == 0
            || p.initial_melody_length > p.max_melody_length
            || p.max_melody_length as usize > MAX_NOTE_COUNT
        {
            return Err(ConfigError::Invalid(format!(
                "melody lengths {}-{} are empty or too long",
                p.initial_melody_length, p.max_melody_length
            )));
        }
        for (name, context) in &p.contexts {
            let mut distinct = context.base_degrees.clone();
            distinct.sort();
            distinct.dedup();
            let size = distinct.len() as u32;
            let reachable = context
                .max_level
                .checked_add(1)
                .map_or(false, |group_size| group_size <= size);
            if context.max_level == 0 || !reachable {
                return Err(ConfigError::Invalid(format!(
                    "context {} cannot reach level {} with {} degrees",
                    name, context.max_level, size
                )));
            }
        }

        let e = &self.exercise;
        if e.range.0 > e.range.1 {
            return Err(ConfigError::Invalid(format!(
                "range {}-{} is reversed",
                e.range.0, e.range.1
            )));
        }
        if e.beats_per_measure == 0 {
            return Err(ConfigError::Invalid("beats per measure must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&e.rest_probability) {
            return Err(ConfigError::Invalid(format!(
                "rest probability {} is outside 0-1",
                e.rest_probability
            )));
        }
        if e.questions_per_round == 0 {
            return Err(ConfigError::Invalid("a round needs at least one question".to_string()));
        }
        Ok(())
    }
}
