use ear_trainer_rs::config::{ProgressionConfig, TrainerConfig};
use ear_trainer_rs::error::{ProgressError, StoreError};
use ear_trainer_rs::exercises::generate_exercise;
use ear_trainer_rs::progress::{
    Clock, GroupId, MemoryStore, NextExercise, ProgressStore, ProgressionEngine, RecordUpdate,
};
use ear_trainer_rs::scoring::{QuestionSheet, RoundScore};
use more_asserts::assert_le;
use rand::rngs::StdRng;
use rand::SeedableRng;

struct TestClock;

impl Clock for TestClock {
    fn now_millis(&self) -> u64 {
        1_700_000_000_000
    }
}

fn engine(seed: u64) -> ProgressionEngine<MemoryStore, TestClock> {
    ProgressionEngine::new(MemoryStore::new(), TestClock, ProgressionConfig::default())
        .with_rng(StdRng::seed_from_u64(seed))
}

fn group(s: &str) -> GroupId {
    s.parse().unwrap()
}

fn tempo(engine: &ProgressionEngine<MemoryStore, TestClock>, g: &str, length: u32) -> u32 {
    engine
        .store()
        .find_group_record("u1", "major", &group(g))
        .unwrap()
        .unwrap()
        .exercise_states[&length]
        .current_tempo_bpm
}

#[test]
fn test_triad_tempo_climbs_five_per_success() {
    let mut engine = engine(1);
    engine.get_first_exercise("u1", "major", "(1,3,5)", 2).unwrap();
    assert_eq!(tempo(&engine, "(1,3,5)", 2), 60);

    for expected in [65, 70, 75] {
        engine.complete_attempt("u1", "major", &group("(1,3,5)"), 2, 0.9).unwrap();
        assert_eq!(tempo(&engine, "(1,3,5)", 2), expected);
    }
    engine.complete_attempt("u1", "major", &group("(1,3,5)"), 2, 0.9).unwrap();
    assert_eq!(tempo(&engine, "(1,3,5)", 2), 80);

    engine.complete_attempt("u1", "major", &group("(1,3,5)"), 2, 0.5).unwrap();
    assert_eq!(tempo(&engine, "(1,3,5)", 2), 80);

    let record = engine
        .store()
        .find_group_record("u1", "major", &group("(1,3,5)"))
        .unwrap()
        .unwrap();
    assert_eq!(record.exercise_states[&2].accuracy_history.to_vec(), vec![0.9, 0.9, 0.9, 0.9, 0.5]);
    assert_eq!(record.last_practiced_at, 1_700_000_000_000);
}

#[test]
fn test_graduation_caps_and_repeats() {
    let mut engine = engine(2);
    engine.get_first_exercise("u1", "major", "(1,3)", 1).unwrap();
    let g = group("(1,3)");
    for _ in 0..30 {
        let result = engine.complete_attempt("u1", "major", &g, 2, 1.0).unwrap();
        assert_le!(result.state.current_tempo_bpm, 180);
    }
    let record = engine.store().find_group_record("u1", "major", &g).unwrap().unwrap();
    let state = &record.exercise_states[&2];
    assert_eq!(state.current_tempo_bpm, 180);
    assert!(state.is_graduated);
    assert_eq!(state.accuracy_history.len(), 30);
    // Unlocked at 100 BPM on the way up.
    assert!(record.exercise_states[&3].is_unlocked);
}

#[test]
fn test_graduated_exercise_is_never_selected() {
    let mut engine = engine(3);
    engine.get_first_exercise("u1", "major", "(1,3)", 1).unwrap();
    let g = group("(1,3)");
    let mut last = None;
    for _ in 0..24 {
        last = Some(engine.complete_attempt("u1", "major", &g, 2, 1.0).unwrap());
    }
    let result = last.unwrap();
    assert!(result.state.is_graduated);
    for _ in 0..50 {
        match engine.select_next("u1", "major", 1).unwrap() {
            NextExercise::Exercise(p) => assert!(!(p.group_id == g && p.melody_length == 2)),
            other => panic!("unexpected {:?}", other),
        }
    }
    match result.next {
        NextExercise::Exercise(p) => assert!(!(p.group_id == g && p.melody_length == 2)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_stale_update_is_rejected() {
    let mut engine = engine(7);
    engine.ensure_level_groups("u1", "major", 1).unwrap();
    let record = engine
        .store()
        .find_group_record("u1", "major", &group("(1,2)"))
        .unwrap()
        .unwrap();
    engine.complete_attempt("u1", "major", &group("(1,2)"), 2, 0.9).unwrap();

    let stale = engine.store_mut().update_group_record(
        &record.id,
        RecordUpdate {
            expected_version: Some(record.version),
            exercise_states: Some(record.exercise_states.clone()),
            ..Default::default()
        },
    );
    assert!(matches!(stale, Err(StoreError::Conflict { expected: 0, actual: 1, .. })));
    assert_eq!(tempo(&engine, "(1,2)", 2), 65);
}

#[test]
fn test_progress_survives_snapshot() {
    let mut engine = engine(4);
    engine.get_first_exercise("u1", "major", "(1,3)", 1).unwrap();
    engine.complete_attempt("u1", "major", &group("(2,5)"), 2, 0.95).unwrap();
    let snapshot = engine.store().to_json().unwrap();

    let restored = MemoryStore::from_json(&snapshot).unwrap();
    let mut engine = ProgressionEngine::new(restored, TestClock, ProgressionConfig::default());
    assert_eq!(tempo(&engine, "(2,5)", 2), 65);
    engine.complete_attempt("u1", "major", &group("(2,5)"), 2, 0.95).unwrap();
    assert_eq!(tempo(&engine, "(2,5)", 2), 70);
    assert_eq!(engine.store().len(), 21);
}

#[test]
fn test_unknown_group_reports_error() {
    let mut engine = engine(5);
    let err = engine
        .complete_attempt("u1", "major", &group("(1,3)"), 2, 0.9)
        .unwrap_err();
    assert!(matches!(err, ProgressError::Store(StoreError::NotFound(_))));
    assert!(err.to_string().contains("(1,3)"));
}

#[test]
fn test_round_feeds_engine() {
    let config = TrainerConfig::default();
    let mut engine = engine(6);
    let mut rng = StdRng::seed_from_u64(6);
    let first = match engine.get_first_exercise("u1", "major", "(1,3)", 1).unwrap() {
        NextExercise::Exercise(p) => p,
        other => panic!("unexpected {:?}", other),
    };

    let mut round = RoundScore::default();
    for _ in 0..config.exercise.questions_per_round {
        let exercise = generate_exercise(&first, &config.exercise, &mut rng).unwrap();
        let mut sheet = QuestionSheet::for_melody(&exercise.melody, exercise.key);
        let answers: Vec<String> = sheet.slots().iter().map(|s| s.expected.to_string()).collect();
        for (i, answer) in answers.iter().enumerate() {
            sheet.submit(i, answer).unwrap();
        }
        assert!(sheet.is_solved());
        round.record(&sheet.result());
    }
    assert_eq!(round.accuracy(), 1.0);

    let result = engine
        .complete_attempt("u1", "major", &first.group_id, first.melody_length, round.accuracy())
        .unwrap();
    assert_eq!(result.state.current_tempo_bpm, 65);
}
