pub mod duration;
pub mod generator;

pub use duration::Duration;
pub use generator::{generate_rhythm, EventKind, MAX_NOTE_COUNT, RhythmEvent, RhythmOptions, RhythmPattern};
