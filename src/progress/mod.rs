pub mod engine;
pub mod state;
pub mod store;

pub use engine::{
    pick_weighted, Clock, CompletionResult, ExerciseParams, NextExercise, ProgressionEngine, SystemClock,
};
pub use state::{AccuracyHistory, ExerciseState, ExerciseStates, GroupId, GroupProgressRecord};
pub use store::{MemoryStore, NewGroupRecord, ProgressStore, RecordUpdate};
