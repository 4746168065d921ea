use rand::Rng;
use serde::Serialize;

use crate::config::ExerciseSettings;
use crate::error::GenerationError;
use crate::exercises::cadence::{cadence_chords, Chord};
use crate::exercises::melody::{generate_melody, MelodyOptions};
use crate::exercises::sequence::{assemble_sequence, metronome_events, AssembledSequence, MetronomeEvent};
use crate::progress::engine::ExerciseParams;
use crate::rhythm::duration::TOLERANCE;
use crate::rhythm::{generate_rhythm, RhythmOptions, RhythmPattern, MAX_NOTE_COUNT};
use crate::theory::notes::{NoteName, PitchClass};

/// Everything the UI needs to play and grade one question.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub params: ExerciseParams,
    pub key: PitchClass,
    pub total_beats: f64,
    pub rhythm: RhythmPattern,
    pub melody: Vec<NoteName>,
    pub sequence: AssembledSequence,
    pub metronome: Vec<MetronomeEvent>,
    pub cadence: Vec<Chord>,
}

/// Beats needed for `melody_length` notes: the configured budget, grown a
/// whole measure at a time until every note fits at the shortest duration.
pub fn beat_budget(melody_length: u32, settings: &ExerciseSettings) -> f64 {
    let shortest = settings
        .shortest_duration
        .beats()
        .min(settings.longest_duration.beats());
    let needed = melody_length as f64 * shortest;
    let measure = settings.beats_per_measure.max(1) as f64;
    let mut total = settings.total_beats;
    while total + TOLERANCE < needed {
        total += measure;
    }
    total
}

pub fn generate_exercise(
    params: &ExerciseParams,
    settings: &ExerciseSettings,
    rng: &mut impl Rng,
) -> Result<Exercise, GenerationError> {
    if params.melody_length == 0 || params.melody_length as usize > MAX_NOTE_COUNT {
        return Err(GenerationError::InvalidInput(format!(
            "melody length must be within 1-{}, got {}",
            MAX_NOTE_COUNT, params.melody_length
        )));
    }
    if params.bpm == 0 {
        return Err(GenerationError::InvalidInput("tempo must be positive".to_string()));
    }

    let total_beats = beat_budget(params.melody_length, settings);
    let rhythm = generate_rhythm(
        &RhythmOptions {
            total_beats,
            shortest_duration: settings.shortest_duration,
            longest_duration: settings.longest_duration,
            note_count: params.melody_length as usize,
            allow_rests: settings.allow_rests,
            rest_probability: settings.rest_probability,
        },
        rng,
    )?;
    let melody = generate_melody(
        &MelodyOptions {
            key: Some(settings.key),
            allowed: params.group_id.tokens(),
            range: settings.range,
            count: params.melody_length as usize,
            max_interval: settings.max_interval,
            min_interval: settings.min_interval,
        },
        rng,
    )?;

    let sequence = assemble_sequence(&melody, &rhythm.events);
    let metronome = metronome_events(sequence.total_beats().ceil() as u32, settings.beats_per_measure);

    Ok(Exercise {
        params: params.clone(),
        key: settings.key,
        total_beats,
        rhythm,
        melody,
        sequence,
        metronome,
        cadence: cadence_chords(settings.key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::Duration;
    use crate::theory::degree::degree_from_note;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(group: &str, melody_length: u32) -> ExerciseParams {
        ExerciseParams {
            group_id: group.parse().unwrap(),
            melody_length,
            bpm: 60,
        }
    }

    #[test]
    fn test_beat_budget_grows_by_measures() {
        let settings = ExerciseSettings::default();
        assert_eq!(beat_budget(2, &settings), 4.0);
        assert_eq!(beat_budget(16, &settings), 4.0);
        // 17 sixteenths need 4.25 beats.
        assert_eq!(beat_budget(17, &settings), 8.0);

        let mut slow = settings.clone();
        slow.shortest_duration = Duration::Quarter;
        slow.longest_duration = Duration::Half;
        assert_eq!(beat_budget(12, &slow), 12.0);
    }

    #[test]
    fn test_exercise_uses_group_degrees() {
        let settings = ExerciseSettings::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let exercise = generate_exercise(&params("(1,3,5)", 4), &settings, &mut rng).unwrap();
            assert_eq!(exercise.melody.len(), 4);
            for note in &exercise.melody {
                let degree = degree_from_note(note.pitch_class(), settings.key).to_string();
                assert!(["1", "3", "5"].contains(&degree.as_str()), "{} in melody", degree);
            }
            assert!((exercise.rhythm.total_beats() - 4.0).abs() < 1e-9);
            assert_eq!(exercise.cadence.len(), 4);
        }
    }

    #[test]
    fn test_exercise_sequence_and_metronome() {
        let settings = ExerciseSettings::default();
        let mut rng = StdRng::seed_from_u64(5);
        let exercise = generate_exercise(&params("(1,2)", 3), &settings, &mut rng).unwrap();
        let sounded: Vec<NoteName> = exercise.sequence.events.iter().filter_map(|e| e.note).collect();
        assert_eq!(sounded, exercise.melody[..sounded.len()].to_vec());
        assert_eq!(exercise.metronome.len(), 5);
        assert!(exercise.metronome[0].is_accent());
    }

    #[test]
    fn test_exercise_without_rests() {
        let mut settings = ExerciseSettings::default();
        settings.allow_rests = false;
        let mut rng = StdRng::seed_from_u64(8);
        let exercise = generate_exercise(&params("(1,5)", 6), &settings, &mut rng).unwrap();
        assert_eq!(exercise.rhythm.events.len(), 6);
        assert!(exercise.rhythm.events.iter().all(|e| e.is_note()));
        assert_eq!(exercise.sequence.notes_assigned, 6);
    }

    #[test]
    fn test_invalid_params() {
        let settings = ExerciseSettings::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_exercise(&params("(1,3)", 0), &settings, &mut rng).is_err());
        let mut zero_tempo = params("(1,3)", 2);
        zero_tempo.bpm = 0;
        assert!(generate_exercise(&zero_tempo, &settings, &mut rng).is_err());
        assert!(generate_exercise(&params("(1,3)", u32::MAX), &settings, &mut rng).is_err());
    }
}
