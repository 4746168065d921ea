use serde::{Deserialize, Serialize};

use crate::rhythm::{Duration, EventKind, RhythmEvent};
use crate::theory::notes::NoteName;

/// A rhythm event placed on the timeline, with its pitch when it sounds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SequenceEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub duration: Duration,
    pub beats: f64,
    pub start_beat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<NoteName>,
}

impl SequenceEvent {
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.beats
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssembledSequence {
    pub events: Vec<SequenceEvent>,
    pub notes_assigned: usize,
    /// Note slots that had no pitch left and were played as rests.
    pub degraded_slots: usize,
    /// Pitches that found no note slot.
    pub unused_notes: usize,
}

impl AssembledSequence {
    pub fn total_beats(&self) -> f64 {
        self.events.last().map_or(0.0, SequenceEvent::end_beat)
    }
}

/// Zip pitches onto the note slots of a rhythm, in order.
pub fn assemble_sequence(notes: &[NoteName], rhythm: &[RhythmEvent]) -> AssembledSequence {
    let mut events = Vec::with_capacity(rhythm.len());
    let mut next_note = notes.iter();
    let mut notes_assigned = 0;
    let mut degraded_slots = 0;
    let mut start_beat = 0.0;

    for item in rhythm {
        let note = match item.kind {
            EventKind::Note => {
                let note = next_note.next().copied();
                match note {
                    Some(_) => notes_assigned += 1,
                    None => degraded_slots += 1,
                }
                note
            }
            EventKind::Rest => None,
        };
        events.push(SequenceEvent {
            kind: if note.is_some() { EventKind::Note } else { EventKind::Rest },
            duration: item.duration,
            beats: item.beats,
            start_beat,
            note,
        });
        start_beat += item.beats;
    }

    let unused_notes = notes.len() - notes_assigned;
    if degraded_slots > 0 {
        log::warn!("sequence: {} note slots had no pitch and became rests", degraded_slots);
    }
    if unused_notes > 0 {
        log::debug!("sequence: {} pitches left without a note slot", unused_notes);
    }

    AssembledSequence {
        events,
        notes_assigned,
        degraded_slots,
        unused_notes,
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Click {
    Accent,
    Normal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetronomeEvent {
    pub beat: f64,
    pub pitch: Click,
    pub velocity: f64,
}

impl MetronomeEvent {
    pub fn is_accent(&self) -> bool {
        self.pitch == Click::Accent
    }
}

pub const ACCENT_VELOCITY: f64 = 0.8;
pub const NORMAL_VELOCITY: f64 = 0.5;

/// One click per beat from 0 through `total_beats`, accenting each downbeat.
pub fn metronome_events(total_beats: u32, beats_per_measure: u32) -> Vec<MetronomeEvent> {
    let beats_per_measure = beats_per_measure.max(1);
    (0..=total_beats)
        .map(|beat| {
            let accent = beat % beats_per_measure == 0;
            MetronomeEvent {
                beat: beat as f64,
                pitch: if accent { Click::Accent } else { Click::Normal },
                velocity: if accent { ACCENT_VELOCITY } else { NORMAL_VELOCITY },
            }
        })
        .collect()
}
