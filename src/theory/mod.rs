pub mod degree;
pub mod notes;

pub use degree::{degree_from_note, note_from_degree, parse_degree_list, ScaleDegree};
pub use notes::{interval_semitones, master_notes, NoteName, PitchClass};
