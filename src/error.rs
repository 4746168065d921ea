use thiserror::Error;

/// Failures of the pure generators (rhythm, melody, theory lookups).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid note: \"{0}\" is not in the master note list")]
    UnknownNote(String),

    #[error("Invalid key: \"{0}\"")]
    UnknownKey(String),

    #[error("Invalid scale degree: \"{0}\"")]
    InvalidDegree(String),

    #[error("Cannot generate sequence: no notes available in {range_start}-{range_end} for [{allowed}]")]
    NoAvailableNotes {
        range_start: String,
        range_end: String,
        allowed: String,
    },

    #[error(
        "Generation failed: no valid notes meet interval constraints ({min}-{max} semitones) \
         from note \"{previous}\" within the available pool: [{pool}]"
    )]
    Unsatisfiable {
        previous: String,
        min: String,
        max: String,
        pool: String,
    },
}

/// Failures reported by a `ProgressStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Progress record not found: {0}")]
    NotFound(String),

    #[error("Progress record already exists for user {user_id}, context {context}, group {group_id}")]
    AlreadyExists {
        user_id: String,
        context: String,
        group_id: String,
    },

    #[error("Progress record {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: String, expected: u64, actual: u64 },

    #[error("Failed to serialize progress: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Failures of the progression engine's public operations.
#[derive(Error, Debug)]
pub enum ProgressError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Exercise state for length {melody_length} not found in group {group_id}")]
    MissingExerciseState {
        group_id: String,
        melody_length: u32,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
