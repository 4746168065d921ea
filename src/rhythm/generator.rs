use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::rhythm::duration::{Duration, TOLERANCE};

/// Upper bound on the notes a single request may ask for.
pub const MAX_NOTE_COUNT: usize = 256;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Note,
    Rest,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RhythmEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub duration: Duration,
    pub beats: f64,
}

impl RhythmEvent {
    pub fn note(duration: Duration) -> Self {
        RhythmEvent {
            kind: EventKind::Note,
            duration,
            beats: duration.beats(),
        }
    }

    pub fn rest(duration: Duration) -> Self {
        RhythmEvent {
            kind: EventKind::Rest,
            duration,
            beats: duration.beats(),
        }
    }

    pub fn is_note(&self) -> bool {
        self.kind == EventKind::Note
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct RhythmOptions {
    pub total_beats: f64,
    pub shortest_duration: Duration,
    pub longest_duration: Duration,
    #[serde(alias = "n")]
    pub note_count: usize,
    pub allow_rests: bool,
    pub rest_probability: f64,
}

impl Default for RhythmOptions {
    fn default() -> Self {
        RhythmOptions {
            total_beats: 4.0,
            shortest_duration: Duration::Sixteenth,
            longest_duration: Duration::Half,
            note_count: 4,
            allow_rests: true,
            rest_probability: 0.2,
        }
    }
}

/// A generated rhythm plus how many of the requested notes actually fit.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RhythmPattern {
    pub events: Vec<RhythmEvent>,
    pub notes_placed: usize,
    pub notes_requested: usize,
}

impl RhythmPattern {
    pub fn total_beats(&self) -> f64 {
        self.events.iter().map(|e| e.beats).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.notes_placed == self.notes_requested
    }
}

/// Generate a rhythm pattern.
///
/// Without rests, exactly `note_count` notes are produced and the beat budget
/// is ignored. With rests, the result always fills `total_beats`; if the
/// note quota cannot be met the pattern is returned short (see
/// `RhythmPattern::notes_placed`).
pub fn generate_rhythm(
    options: &RhythmOptions,
    rng: &mut impl Rng,
) -> Result<RhythmPattern, GenerationError> {
    if !(0.0..=1.0).contains(&options.rest_probability) {
        return Err(GenerationError::InvalidInput(format!(
            "rest probability must be within 0-1, got {}",
            options.rest_probability
        )));
    }

    if options.note_count > MAX_NOTE_COUNT {
        return Err(GenerationError::InvalidInput(format!(
            "at most {} notes can be requested, got {}",
            MAX_NOTE_COUNT, options.note_count
        )));
    }

    let (mut shortest, mut longest) = (options.shortest_duration, options.longest_duration);
    if shortest.beats() > longest.beats() {
        std::mem::swap(&mut shortest, &mut longest);
    }

    let pattern = if options.allow_rests {
        validate_budget(options.total_beats)?;
        generate_with_rests(options, shortest, longest, rng)
    } else {
        generate_fixed_notes(options.note_count, shortest, longest, rng)
    };

    if !pattern.is_complete() {
        log::warn!(
            "rhythm: placed {} of {} notes in {} beats ({}-{})",
            pattern.notes_placed,
            pattern.notes_requested,
            options.total_beats,
            shortest,
            longest
        );
    }
    Ok(pattern)
}

fn validate_budget(total_beats: f64) -> Result<(), GenerationError> {
    if !total_beats.is_finite() || total_beats <= 0.0 {
        return Err(GenerationError::InvalidInput(format!(
            "total beats must be positive, got {}",
            total_beats
        )));
    }
    let grain = Duration::shortest().beats();
    let steps = (total_beats / grain).round();
    if (steps * grain - total_beats).abs() > TOLERANCE {
        return Err(GenerationError::InvalidInput(format!(
            "total beats {} is not a multiple of {}",
            total_beats, grain
        )));
    }
    Ok(())
}

fn generate_fixed_notes(
    note_count: usize,
    shortest: Duration,
    longest: Duration,
    rng: &mut impl Rng,
) -> RhythmPattern {
    let choices = Duration::within(shortest.beats(), longest.beats());
    if choices.is_empty() {
        return RhythmPattern {
            events: Vec::new(),
            notes_placed: 0,
            notes_requested: note_count,
        };
    }

    let events: Vec<RhythmEvent> = (0..note_count)
        .map(|_| RhythmEvent::note(choices[rng.gen_range(0..choices.len())]))
        .collect();

    RhythmPattern {
        notes_placed: events.len(),
        events,
        notes_requested: note_count,
    }
}

fn generate_with_rests(
    options: &RhythmOptions,
    shortest: Duration,
    longest: Duration,
    rng: &mut impl Rng,
) -> RhythmPattern {
    let target = options.note_count;
    let min_value = shortest.beats();
    let choices = Duration::within(min_value, longest.beats());

    let mut events = Vec::new();
    let mut remaining = options.total_beats;
    let mut placed = 0usize;

    while placed < target && remaining >= min_value - TOLERANCE {
        let notes_left = target - placed;
        let upper = longest
            .beats()
            .min(remaining / notes_left as f64)
            .min(remaining);
        if upper < min_value - TOLERANCE {
            break;
        }

        // Leave room for every note still owed after this one.
        let reserve = (notes_left - 1) as f64 * min_value;
        let candidates: Vec<Duration> = choices
            .iter()
            .copied()
            .filter(|d| d.beats() <= upper + TOLERANCE && remaining - d.beats() >= reserve - TOLERANCE)
            .collect();
        if candidates.is_empty() {
            break;
        }

        let picked = candidates[rng.gen_range(0..candidates.len())];
        events.push(RhythmEvent::note(picked));
        remaining = snap(remaining - picked.beats());
        placed += 1;

        if placed < target && rng.gen_bool(options.rest_probability) {
            let slack = remaining - (target - placed) as f64 * min_value;
            if slack >= Duration::shortest().beats() - TOLERANCE {
                let rests: Vec<Duration> = choices
                    .iter()
                    .copied()
                    .filter(|d| d.beats() <= slack + TOLERANCE)
                    .collect();
                if !rests.is_empty() {
                    let rest = rests[rng.gen_range(0..rests.len())];
                    events.push(RhythmEvent::rest(rest));
                    remaining = snap(remaining - rest.beats());
                }
            }
        }
    }

    fill_with_rests(&mut events, remaining);

    RhythmPattern {
        events,
        notes_placed: placed,
        notes_requested: target,
    }
}

/// Pad the tail with rests, largest first, until the budget is spent.
fn fill_with_rests(events: &mut Vec<RhythmEvent>, mut remaining: f64) {
    let floor = Duration::shortest().beats();
    while remaining >= floor - TOLERANCE {
        let Some(rest) = Duration::ALL
            .iter()
            .rev()
            .copied()
            .find(|d| d.beats() <= remaining + TOLERANCE)
        else {
            break;
        };
        events.push(RhythmEvent::rest(rest));
        remaining = snap(remaining - rest.beats());
    }
}

fn snap(value: f64) -> f64 {
    if value.abs() < TOLERANCE {
        0.0
    } else {
        value
    }
}
