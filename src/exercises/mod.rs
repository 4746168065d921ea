pub mod cadence;
pub mod curriculum;
pub mod generators;
pub mod melody;
pub mod sequence;

pub use cadence::{cadence_chords, Chord};
pub use curriculum::{curriculum_levels, level_groups, CurriculumLevel};
pub use generators::{beat_budget, generate_exercise, Exercise};
pub use melody::{available_notes, generate_melody, MelodyOptions};
pub use sequence::{assemble_sequence, metronome_events, AssembledSequence, Click, MetronomeEvent, SequenceEvent};
