use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::rhythm::MAX_NOTE_COUNT;
use crate::theory::degree::{degree_from_note, ScaleDegree};
use crate::theory::notes::{interval_semitones, master_notes, NoteName, PitchClass};

/// How a single allowed-note token is matched against the candidates.
#[derive(Clone, Copy, Debug, PartialEq)]
enum NoteFilter {
    Note(NoteName),
    PitchClass(PitchClass),
    Degree(ScaleDegree),
}

impl NoteFilter {
    fn parse(token: &str) -> Option<NoteFilter> {
        token
            .parse::<NoteName>()
            .map(NoteFilter::Note)
            .or_else(|_| token.parse::<PitchClass>().map(NoteFilter::PitchClass))
            .or_else(|_| token.parse::<ScaleDegree>().map(NoteFilter::Degree))
            .ok()
    }

    fn matches(self, note: NoteName, key: Option<PitchClass>) -> bool {
        match self {
            NoteFilter::Note(n) => n == note,
            NoteFilter::PitchClass(pc) => pc == note.pitch_class(),
            NoteFilter::Degree(d) => key.is_some_and(|k| degree_from_note(note.pitch_class(), k) == d),
        }
    }
}

/// Notes of `master` inside the inclusive `range`, narrowed to the `allowed`
/// tokens (note names, pitch classes, or scale degrees when a key is given).
///
/// With a key, the result is rotated so the first tonic leads; nothing is
/// dropped. An endpoint missing from `master` or a reversed range gives an
/// empty list.
pub fn available_notes(
    master: &[NoteName],
    range: (NoteName, NoteName),
    allowed: &[String],
    key: Option<PitchClass>,
) -> Vec<NoteName> {
    let start = master.iter().position(|n| *n == range.0);
    let end = master.iter().position(|n| *n == range.1);
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s <= e => (s, e),
        _ => return Vec::new(),
    };
    let in_range = &master[start..=end];

    if allowed.is_empty() {
        return in_range.to_vec();
    }

    let filters: Vec<NoteFilter> = allowed.iter().filter_map(|t| NoteFilter::parse(t.trim())).collect();
    let mut result: Vec<NoteName> = in_range
        .iter()
        .copied()
        .filter(|note| filters.iter().any(|f| f.matches(*note, key)))
        .collect();

    if let Some(key) = key {
        if let Some(first_tonic) = result.iter().position(|n| n.pitch_class() == key) {
            result.rotate_left(first_tonic);
        }
    }
    result
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MelodyOptions {
    #[serde(default, alias = "keyId")]
    pub key: Option<PitchClass>,
    #[serde(default, alias = "notes")]
    pub allowed: Vec<String>,
    pub range: (NoteName, NoteName),
    #[serde(alias = "numberOfNotes")]
    pub count: usize,
    #[serde(default)]
    pub max_interval: Option<u32>,
    #[serde(default)]
    pub min_interval: Option<u32>,
}

fn bound_label(bound: Option<u32>) -> String {
    bound.map_or_else(|| "any".to_string(), |b| b.to_string())
}

fn join_notes(notes: &[NoteName]) -> String {
    notes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
}

/// Random walk over the available notes under interval bounds.
///
/// Fails fast: if some step has no candidate the whole generation errors
/// with the previous note and the full pool, there is no backtracking.
pub fn generate_melody(
    options: &MelodyOptions,
    rng: &mut impl Rng,
) -> Result<Vec<NoteName>, GenerationError> {
    if options.count == 0 || options.count > MAX_NOTE_COUNT {
        return Err(GenerationError::InvalidInput(format!(
            "number of notes must be within 1-{}, got {}",
            MAX_NOTE_COUNT, options.count
        )));
    }
    if let (Some(min), Some(max)) = (options.min_interval, options.max_interval) {
        if min > max {
            return Err(GenerationError::InvalidInput(format!(
                "minimum interval {} exceeds maximum interval {}",
                min, max
            )));
        }
    }
    for endpoint in [options.range.0, options.range.1] {
        if endpoint.master_index().is_none() {
            return Err(GenerationError::UnknownNote(endpoint.to_string()));
        }
    }
    if options.range.0 > options.range.1 {
        return Err(GenerationError::InvalidInput(format!(
            "range start {} is above range end {}",
            options.range.0, options.range.1
        )));
    }

    let pool = available_notes(&master_notes(), options.range, &options.allowed, options.key);
    if pool.is_empty() {
        return Err(GenerationError::NoAvailableNotes {
            range_start: options.range.0.to_string(),
            range_end: options.range.1.to_string(),
            allowed: options.allowed.join(", "),
        });
    }

    let mut sequence = Vec::new();
    sequence.push(pool[rng.gen_range(0..pool.len())]);

    while sequence.len() < options.count {
        let previous = sequence[sequence.len() - 1];
        let mut candidates = Vec::new();
        for &note in &pool {
            if note == previous && pool.len() > 1 {
                continue;
            }
            let interval = interval_semitones(note, previous)?;
            let fits_max = options.max_interval.map_or(true, |max| interval <= max);
            let fits_min = options.min_interval.map_or(true, |min| interval >= min);
            if fits_max && fits_min {
                candidates.push(note);
            }
        }

        if candidates.is_empty() {
            return Err(GenerationError::Unsatisfiable {
                previous: previous.to_string(),
                min: bound_label(options.min_interval),
                max: bound_label(options.max_interval),
                pool: join_notes(&pool),
            });
        }
        sequence.push(candidates[rng.gen_range(0..candidates.len())]);
    }

    Ok(sequence)
}
