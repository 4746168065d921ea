use serde::Serialize;

use crate::theory::notes::{NoteName, PitchClass};

/// Octave the cadence is voiced in.
const CADENCE_OCTAVE: i32 = 4;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Chord {
    pub numeral: &'static str,
    pub notes: Vec<NoteName>,
}

fn major_triad(root: NoteName) -> Vec<NoteName> {
    vec![root, root.transpose(4), root.transpose(7)]
}

/// I-IV-V-I in root position, played before a melody to set the key.
pub fn cadence_chords(key: PitchClass) -> Vec<Chord> {
    let tonic = NoteName::from_midi((CADENCE_OCTAVE + 1) * 12 + key.index() as i32);
    [("I", 0), ("IV", 5), ("V", 7), ("I", 0)]
        .into_iter()
        .map(|(numeral, offset)| Chord {
            numeral,
            notes: major_triad(tonic.transpose(offset)),
        })
        .collect()
}
