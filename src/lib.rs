use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod exercises;
pub mod playback;
pub mod progress;
pub mod rhythm;
pub mod scoring;
pub mod theory;

use config::{ExerciseSettings, TrainerConfig};
use exercises::{AssembledSequence, MelodyOptions, MetronomeEvent, SequenceEvent};
use js_sys::Function;
use playback::{Humanization, PlaybackObserver, PlaybackSession};
use progress::{Clock, ExerciseParams, MemoryStore, ProgressionEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rhythm::{RhythmEvent, RhythmOptions};
use scoring::{QuestionSheet, RoundScore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use theory::{NoteName, PitchClass, ScaleDegree};

use std::cell::RefCell;
use std::fmt::Display;
use wasm_bindgen::JsCast;

/// Browser clock for `lastPracticedAt`.
struct JsClock;

impl Clock for JsClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

struct Trainer {
    engine: ProgressionEngine<MemoryStore, JsClock>,
    exercise: ExerciseSettings,
    rng: StdRng,
}

impl Trainer {
    fn new(config: TrainerConfig) -> Self {
        Trainer {
            engine: ProgressionEngine::new(MemoryStore::new(), JsClock, config.progression),
            exercise: config.exercise,
            rng: StdRng::from_entropy(),
        }
    }
}

thread_local! {
    static TRAINER: RefCell<Trainer> = RefCell::new(Trainer::new(TrainerConfig::default()));
}

fn js_error(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_error)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(js_error)
}

/// Progression calls report failures in-band instead of throwing.
#[derive(Serialize)]
struct ProgressResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond<T: Serialize, E: Display>(outcome: Result<T, E>) -> Result<JsValue, JsValue> {
    let response = match outcome {
        Ok(result) => ProgressResponse {
            success: true,
            result: Some(result),
            error: None,
        },
        Err(e) => {
            log::warn!("progress: {}", e);
            ProgressResponse {
                success: false,
                result: None,
                error: Some(e.to_string()),
            }
        }
    };
    to_js(&response)
}

/// Replace the trainer configuration. Unset fields take their defaults.
#[wasm_bindgen]
pub fn configure(config_js: JsValue) -> Result<(), JsValue> {
    let config: TrainerConfig = if is_absent(&config_js) {
        TrainerConfig::default()
    } else {
        from_js(config_js)?
    };
    config.validate().map_err(js_error)?;
    TRAINER.with(|cell| {
        let mut trainer = cell.borrow_mut();
        trainer.engine.set_config(config.progression);
        trainer.exercise = config.exercise;
    });
    Ok(())
}

/// Generate a rhythm pattern: `{events, notesPlaced, notesRequested}`.
#[wasm_bindgen]
pub fn generate_rhythm(options_js: JsValue) -> Result<JsValue, JsValue> {
    let options: RhythmOptions = from_js(options_js)?;
    let pattern = TRAINER
        .with(|cell| rhythm::generate_rhythm(&options, &mut cell.borrow_mut().rng))
        .map_err(js_error)?;
    to_js(&pattern)
}

#[wasm_bindgen]
pub fn generate_melody(options_js: JsValue) -> Result<JsValue, JsValue> {
    let options: MelodyOptions = from_js(options_js)?;
    let melody = TRAINER
        .with(|cell| exercises::generate_melody(&options, &mut cell.borrow_mut().rng))
        .map_err(js_error)?;
    to_js(&melody)
}

#[wasm_bindgen]
pub fn available_notes(
    range_start: &str,
    range_end: &str,
    allowed_js: JsValue,
    key: Option<String>,
) -> Result<JsValue, JsValue> {
    let start: NoteName = range_start.parse().map_err(js_error)?;
    let end: NoteName = range_end.parse().map_err(js_error)?;
    let allowed: Vec<String> = if is_absent(&allowed_js) {
        Vec::new()
    } else {
        from_js(allowed_js)?
    };
    let key = key
        .map(|k| k.parse::<PitchClass>())
        .transpose()
        .map_err(js_error)?;
    let notes = exercises::available_notes(&theory::master_notes(), (start, end), &allowed, key);
    to_js(&notes)
}

#[wasm_bindgen]
pub fn assemble_sequence(notes_js: JsValue, rhythm_js: JsValue) -> Result<JsValue, JsValue> {
    let notes: Vec<NoteName> = from_js(notes_js)?;
    let rhythm: Vec<RhythmEvent> = from_js(rhythm_js)?;
    let sequence: AssembledSequence = exercises::assemble_sequence(&notes, &rhythm);
    to_js(&sequence)
}

#[wasm_bindgen]
pub fn metronome_events(total_beats: u32, beats_per_measure: Option<u32>) -> Result<JsValue, JsValue> {
    to_js(&exercises::metronome_events(total_beats, beats_per_measure.unwrap_or(4)))
}

#[wasm_bindgen]
pub fn interval_semitones(a: &str, b: &str) -> Result<u32, JsValue> {
    let a: NoteName = a.parse().map_err(js_error)?;
    let b: NoteName = b.parse().map_err(js_error)?;
    theory::interval_semitones(a, b).map_err(js_error)
}

/// Degree of `note` in `key`, or `"?"`.
#[wasm_bindgen]
pub fn degree_from_note(note: &str, key: &str) -> String {
    theory::degree::degree_label(note, key)
}

/// Pitch class of `degree` in `key`, or `"?"`.
#[wasm_bindgen]
pub fn note_from_degree(degree: &str, key: &str) -> String {
    theory::degree::note_label(degree, key)
}

#[wasm_bindgen]
pub fn parse_degree_list(input: &str) -> Result<JsValue, JsValue> {
    to_js(&theory::parse_degree_list(input))
}

#[wasm_bindgen]
pub fn grade_answer(entered: &str, expected: &str) -> Result<JsValue, JsValue> {
    let expected: ScaleDegree = expected.parse().map_err(js_error)?;
    to_js(&scoring::grade_answer(entered, expected))
}

#[wasm_bindgen]
pub fn cadence_chords(key: &str) -> Result<JsValue, JsValue> {
    let key: PitchClass = key.parse().map_err(js_error)?;
    to_js(&exercises::cadence_chords(key))
}

/// Build the full exercise for `{groupID, melodyLength, bpm}` with the
/// configured exercise settings.
#[wasm_bindgen]
pub fn generate_exercise(params_js: JsValue) -> Result<JsValue, JsValue> {
    let params: ExerciseParams = from_js(params_js)?;
    let exercise = TRAINER
        .with(|cell| {
            let trainer = &mut *cell.borrow_mut();
            exercises::generate_exercise(&params, &trainer.exercise, &mut trainer.rng)
        })
        .map_err(js_error)?;
    to_js(&exercise)
}

#[wasm_bindgen]
pub fn complete_attempt(
    user_id: &str,
    context: &str,
    group_id: &str,
    melody_length: u32,
    accuracy: f64,
) -> Result<JsValue, JsValue> {
    let group = match group_id.parse::<progress::GroupId>() {
        Ok(group) => group,
        Err(e) => return respond::<(), _>(Err(e)),
    };
    let outcome = TRAINER.with(|cell| {
        cell.borrow_mut()
            .engine
            .complete_attempt(user_id, context, &group, melody_length, accuracy)
    });
    respond(outcome)
}

#[wasm_bindgen]
pub fn get_first_exercise(user_id: &str, context: &str, group_id: &str, level: u32) -> Result<JsValue, JsValue> {
    let outcome = TRAINER.with(|cell| {
        cell.borrow_mut()
            .engine
            .get_first_exercise(user_id, context, group_id, level)
    });
    respond(outcome)
}

/// Snapshot of every progress record, for local storage.
#[wasm_bindgen]
pub fn export_progress() -> Result<String, JsValue> {
    TRAINER
        .with(|cell| cell.borrow().engine.store().to_json())
        .map_err(js_error)
}

#[wasm_bindgen]
pub fn import_progress(json: &str) -> Result<(), JsValue> {
    let store = MemoryStore::from_json(json).map_err(js_error)?;
    TRAINER.with(|cell| *cell.borrow_mut().engine.store_mut() = store);
    Ok(())
}

/// Levels of a context with their group IDs.
#[wasm_bindgen]
pub fn get_curriculum(context: &str) -> Result<JsValue, JsValue> {
    let levels = TRAINER
        .with(|cell| {
            cell.borrow()
                .engine
                .config()
                .context(context)
                .map(exercises::curriculum_levels)
        })
        .ok_or_else(|| JsValue::from_str(&format!("Unknown context: {}", context)))?;
    to_js(&levels)
}

fn is_absent(value: &JsValue) -> bool {
    value.is_null() || value.is_undefined()
}

/// Optional `onNotePlay`, `onLoopStart` and `onLoopEnd` callbacks from a JS
/// object. The first callback that throws is reported after `advance`.
struct JsObserver {
    on_note_play: Option<Function>,
    on_loop_start: Option<Function>,
    on_loop_end: Option<Function>,
    error: Option<JsValue>,
}

impl JsObserver {
    fn from_js(value: &JsValue) -> Result<Self, JsValue> {
        let callback = |name: &str| -> Result<Option<Function>, JsValue> {
            if is_absent(value) {
                return Ok(None);
            }
            let field = js_sys::Reflect::get(value, &JsValue::from_str(name))?;
            Ok(field.dyn_into::<Function>().ok())
        };
        Ok(JsObserver {
            on_note_play: callback("onNotePlay")?,
            on_loop_start: callback("onLoopStart")?,
            on_loop_end: callback("onLoopEnd")?,
            error: None,
        })
    }

    fn keep_first(error: &mut Option<JsValue>, outcome: Result<JsValue, JsValue>) {
        if let Err(e) = outcome {
            error.get_or_insert(e);
        }
    }
}

impl PlaybackObserver for JsObserver {
    fn on_note_play(&mut self, time: f64, note: NoteName, index: usize) {
        if let Some(f) = &self.on_note_play {
            let outcome = f.call3(
                &JsValue::NULL,
                &JsValue::from(time),
                &JsValue::from_str(&note.to_string()),
                &JsValue::from(index as u32),
            );
            Self::keep_first(&mut self.error, outcome);
        }
    }

    fn on_loop_start(&mut self, time: f64, iteration: u32) {
        if let Some(f) = &self.on_loop_start {
            let outcome = f.call2(&JsValue::NULL, &JsValue::from(time), &JsValue::from(iteration));
            Self::keep_first(&mut self.error, outcome);
        }
    }

    fn on_loop_end(&mut self, time: f64, iteration: u32) {
        if let Some(f) = &self.on_loop_end {
            let outcome = f.call2(&JsValue::NULL, &JsValue::from(time), &JsValue::from(iteration));
            Self::keep_first(&mut self.error, outcome);
        }
    }
}

/// A playback session owned by the page, one per played exercise. The host
/// drives it from its audio clock with `advance`.
#[wasm_bindgen]
pub struct Playback {
    session: PlaybackSession,
}

impl From<PlaybackSession> for Playback {
    fn from(session: PlaybackSession) -> Self {
        Playback { session }
    }
}

#[wasm_bindgen]
impl Playback {
    /// `metronome` may be omitted to derive one click per beat in 4/4.
    #[wasm_bindgen(constructor)]
    pub fn new(
        sequence_js: JsValue,
        bpm: u32,
        looping: bool,
        metronome_js: JsValue,
        humanize: bool,
    ) -> Result<Playback, JsValue> {
        let sequence: Vec<SequenceEvent> = from_js(sequence_js)?;
        let metronome: Option<Vec<MetronomeEvent>> = if is_absent(&metronome_js) {
            None
        } else {
            Some(from_js(metronome_js)?)
        };
        let session = PlaybackSession::new(&sequence, bpm, looping)
            .map_err(js_error)?
            .with_metronome(metronome.as_deref());
        let session = if humanize {
            TRAINER.with(|cell| session.humanize(&Humanization::default(), &mut cell.borrow_mut().rng))
        } else {
            session
        };
        Ok(Playback::from(session))
    }

    pub fn notes(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.notes())
    }

    pub fn clicks(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.clicks())
    }

    /// Seconds of one pass through the sequence.
    pub fn length(&self) -> f64 {
        self.session.length()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn play(&mut self) {
        self.session.play();
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    pub fn set_on_stop(&mut self, callback: Function) {
        self.session.set_on_stop(move || {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                log::warn!("playback: onStop threw {:?}", e);
            }
        });
    }

    /// Move the session clock forward by `elapsed` seconds, firing the
    /// observer's callbacks for everything that fell due.
    pub fn advance(&mut self, elapsed: f64, observer_js: JsValue) -> Result<(), JsValue> {
        let mut observer = JsObserver::from_js(&observer_js)?;
        self.session.advance(elapsed, &mut observer);
        match observer.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Answer slots for one played melody.
#[wasm_bindgen]
pub struct AnswerSheet {
    sheet: QuestionSheet,
}

impl From<QuestionSheet> for AnswerSheet {
    fn from(sheet: QuestionSheet) -> Self {
        AnswerSheet { sheet }
    }
}

#[wasm_bindgen]
impl AnswerSheet {
    #[wasm_bindgen(constructor)]
    pub fn new(melody_js: JsValue, key: &str) -> Result<AnswerSheet, JsValue> {
        let melody: Vec<NoteName> = from_js(melody_js)?;
        let key: PitchClass = key.parse().map_err(js_error)?;
        Ok(AnswerSheet::from(QuestionSheet::for_melody(&melody, key)))
    }

    /// Grade `entered` in slot `index`; returns the slot's status.
    pub fn submit(&mut self, index: usize, entered: &str) -> Result<JsValue, JsValue> {
        let status = self.sheet.submit(index, entered).map_err(js_error)?;
        to_js(&status)
    }

    pub fn slots(&self) -> Result<JsValue, JsValue> {
        to_js(self.sheet.slots())
    }

    pub fn is_solved(&self) -> bool {
        self.sheet.is_solved()
    }

    pub fn result(&self) -> Result<JsValue, JsValue> {
        to_js(&self.sheet.result())
    }
}

/// First-attempt scores over a round; `accuracy()` feeds `complete_attempt`.
#[wasm_bindgen]
#[derive(Default)]
pub struct Round {
    score: RoundScore,
}

#[wasm_bindgen]
impl Round {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Round {
        Round::default()
    }

    pub fn record(&mut self, sheet: &AnswerSheet) {
        self.score.record(&sheet.sheet.result());
    }

    pub fn questions(&self) -> usize {
        self.score.len()
    }

    pub fn mean_score(&self) -> f64 {
        self.score.mean_score()
    }

    pub fn accuracy(&self) -> f64 {
        self.score.accuracy()
    }
}
