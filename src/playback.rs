//! Playback session consumed by the host's audio scheduler.
//!
//! The synthesizer lives outside this crate. A [`PlaybackSession`] turns an
//! assembled sequence into absolute note and click times at a given tempo,
//! then reports what is due as the host advances its clock.

use rand::Rng;
use serde::Serialize;

use crate::error::GenerationError;
use crate::exercises::sequence::{metronome_events, Click, MetronomeEvent, SequenceEvent};
use crate::theory::notes::NoteName;

/// Delay between the last note ending and a non-looping session stopping.
pub const STOP_TAIL_SECONDS: f64 = 0.1;

/// Velocity of notes when no humanization is applied.
pub const BASE_VELOCITY: f64 = 0.7;

/// Humanized notes are never shorter than a 64th note.
const SHORTEST_NOTE_BEATS: f64 = 1.0 / 16.0;

/// Random variation applied to each note when a session is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Humanization {
    /// Maximum onset shift either way, in seconds.
    pub time_jitter: f64,
    pub velocity_jitter: f64,
    /// Largest fraction a note may be shortened by.
    pub max_shortening: f64,
}

impl Default for Humanization {
    fn default() -> Self {
        Humanization {
            time_jitter: 0.02,
            velocity_jitter: 0.1,
            max_shortening: 0.15,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteTrigger {
    /// Position in the melody, counting sounded notes only.
    pub index: usize,
    pub note: NoteName,
    /// Seconds from the start of the iteration.
    pub time: f64,
    pub duration: f64,
    pub velocity: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClickTrigger {
    pub time: f64,
    pub pitch: Click,
    pub velocity: f64,
}

/// Callbacks fired from [`PlaybackSession::advance`]. Times are seconds
/// since `play()`.
pub trait PlaybackObserver {
    fn on_note_play(&mut self, _time: f64, _note: NoteName, _index: usize) {}

    fn on_loop_start(&mut self, _time: f64, _iteration: u32) {}

    fn on_loop_end(&mut self, _time: f64, _iteration: u32) {}
}

impl PlaybackObserver for () {}

pub struct PlaybackSession {
    bpm: u32,
    looping: bool,
    notes: Vec<NoteTrigger>,
    clicks: Vec<ClickTrigger>,
    /// Length of one pass through the sequence, in seconds.
    length: f64,
    playing: bool,
    position: f64,
    iteration: u32,
    next_note: usize,
    started: bool,
    on_stop: Option<Box<dyn FnMut()>>,
}

impl PlaybackSession {
    pub fn new(sequence: &[SequenceEvent], bpm: u32, looping: bool) -> Result<Self, GenerationError> {
        if bpm == 0 {
            return Err(GenerationError::InvalidInput("tempo must be positive".to_string()));
        }
        let seconds_per_beat = 60.0 / bpm as f64;
        let notes = sequence
            .iter()
            .filter_map(|event| event.note.map(|note| (event, note)))
            .enumerate()
            .map(|(index, (event, note))| NoteTrigger {
                index,
                note,
                time: event.start_beat * seconds_per_beat,
                duration: event.beats * seconds_per_beat,
                velocity: BASE_VELOCITY,
            })
            .collect();
        let end_beat = sequence.iter().map(SequenceEvent::end_beat).fold(0.0, f64::max);

        Ok(PlaybackSession {
            bpm,
            looping,
            notes,
            clicks: Vec::new(),
            length: end_beat * seconds_per_beat,
            playing: false,
            position: 0.0,
            iteration: 0,
            next_note: 0,
            started: false,
            on_stop: None,
        })
    }

    fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Add metronome clicks. Without explicit events, one click per beat up
    /// to the end of the sequence is derived in 4/4.
    pub fn with_metronome(mut self, events: Option<&[MetronomeEvent]>) -> Self {
        let derived;
        let events = match events {
            Some(events) => events,
            None => {
                let beats = (self.length / self.seconds_per_beat()).ceil() as u32;
                derived = metronome_events(beats, 4);
                &derived
            }
        };
        let seconds_per_beat = self.seconds_per_beat();
        self.clicks = events
            .iter()
            .map(|e| ClickTrigger {
                time: e.beat * seconds_per_beat,
                pitch: e.pitch,
                velocity: e.velocity,
            })
            .collect();
        self
    }

    pub fn humanize(mut self, settings: &Humanization, rng: &mut impl Rng) -> Self {
        let floor = SHORTEST_NOTE_BEATS * self.seconds_per_beat();
        for trigger in &mut self.notes {
            if settings.time_jitter > 0.0 {
                let shift = rng.gen_range(-settings.time_jitter..=settings.time_jitter);
                trigger.time = (trigger.time + shift).max(0.0);
            }
            if settings.velocity_jitter > 0.0 {
                let shift = rng.gen_range(-settings.velocity_jitter..=settings.velocity_jitter);
                trigger.velocity = (BASE_VELOCITY + shift).clamp(0.1, 1.0);
            }
            if settings.max_shortening > 0.0 {
                let cut = rng.gen_range(0.0..=settings.max_shortening);
                trigger.duration = (trigger.duration * (1.0 - cut)).max(floor);
            }
        }
        // Jitter can swap neighbours.
        self.notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        self
    }

    pub fn set_on_stop(&mut self, callback: impl FnMut() + 'static) {
        self.on_stop = Some(Box::new(callback));
    }

    pub fn notes(&self) -> &[NoteTrigger] {
        &self.notes
    }

    pub fn clicks(&self) -> &[ClickTrigger] {
        &self.clicks
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Seconds of one pass through the sequence.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start from the beginning; a no-op while already playing.
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.position = 0.0;
        self.iteration = 0;
        self.next_note = 0;
        self.started = false;
    }

    /// Stop playback. `on_stop` fires once per running session.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        if let Some(callback) = self.on_stop.as_mut() {
            callback();
        }
    }

    /// Move the clock forward by `elapsed` seconds, reporting every note
    /// and loop boundary that fell due. A non-looping session stops itself
    /// shortly after its last note.
    pub fn advance(&mut self, elapsed: f64, observer: &mut impl PlaybackObserver) {
        if !self.playing {
            return;
        }
        let looping = self.looping && self.length > 0.0;
        if !self.started {
            self.started = true;
            if looping {
                observer.on_loop_start(0.0, 0);
            }
        }
        self.position += elapsed.max(0.0);

        loop {
            let offset = self.iteration as f64 * self.length;
            let local = self.position - offset;
            while let Some(trigger) = self.notes.get(self.next_note) {
                if trigger.time > local {
                    break;
                }
                observer.on_note_play(offset + trigger.time, trigger.note, trigger.index);
                self.next_note += 1;
            }
            if !looping || local < self.length {
                break;
            }
            let boundary = offset + self.length;
            observer.on_loop_end(boundary, self.iteration);
            self.iteration += 1;
            self.next_note = 0;
            observer.on_loop_start(boundary, self.iteration);
        }

        if !looping && self.position >= self.length + STOP_TAIL_SECONDS {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercises::sequence::assemble_sequence;
    use crate::rhythm::{Duration, RhythmEvent};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        notes: Vec<(f64, String, usize)>,
        loop_starts: Vec<(f64, u32)>,
        loop_ends: Vec<(f64, u32)>,
    }

    impl PlaybackObserver for Recorder {
        fn on_note_play(&mut self, time: f64, note: NoteName, index: usize) {
            self.notes.push((time, note.to_string(), index));
        }

        fn on_loop_start(&mut self, time: f64, iteration: u32) {
            self.loop_starts.push((time, iteration));
        }

        fn on_loop_end(&mut self, time: f64, iteration: u32) {
            self.loop_ends.push((time, iteration));
        }
    }

    fn sequence() -> Vec<SequenceEvent> {
        let notes: Vec<NoteName> = ["C4", "E4", "G4"].iter().map(|n| n.parse().unwrap()).collect();
        let rhythm = vec![
            RhythmEvent::note(Duration::Quarter),
            RhythmEvent::rest(Duration::Quarter),
            RhythmEvent::note(Duration::Quarter),
            RhythmEvent::note(Duration::Quarter),
        ];
        assemble_sequence(&notes, &rhythm).events
    }

    #[test]
    fn test_schedule_in_seconds() {
        let session = PlaybackSession::new(&sequence(), 120, false).unwrap();
        let times: Vec<f64> = session.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 1.5]);
        assert_eq!(session.notes()[2].index, 2);
        assert_eq!(session.notes()[0].duration, 0.5);
        assert_eq!(session.length(), 2.0);
        assert!(PlaybackSession::new(&sequence(), 0, false).is_err());
    }

    #[test]
    fn test_metronome_fallback() {
        let session = PlaybackSession::new(&sequence(), 60, false).unwrap().with_metronome(None);
        assert_eq!(session.clicks().len(), 5);
        assert_eq!(session.clicks()[0].pitch, Click::Accent);
        assert_eq!(session.clicks()[4].time, 4.0);

        let given = metronome_events(2, 2);
        let session = PlaybackSession::new(&sequence(), 60, false)
            .unwrap()
            .with_metronome(Some(&given));
        assert_eq!(session.clicks().len(), 3);
    }

    #[test]
    fn test_humanize_bounds() {
        let mut rng = StdRng::seed_from_u64(4);
        let plain = PlaybackSession::new(&sequence(), 240, false).unwrap();
        let human = PlaybackSession::new(&sequence(), 240, false)
            .unwrap()
            .humanize(&Humanization::default(), &mut rng);
        let floor = SHORTEST_NOTE_BEATS * 0.25;
        for (a, b) in plain.notes().iter().zip(human.notes()) {
            assert!((a.time - b.time).abs() <= 0.02 + 1e-12);
            assert!(b.velocity >= 0.6 - 1e-12 && b.velocity <= 0.8 + 1e-12);
            assert!(b.duration <= a.duration + 1e-12);
            assert!(b.duration >= (a.duration * 0.85).max(floor) - 1e-12);
        }
    }

    #[test]
    fn test_advance_dispatches_and_stops_once() {
        let stops = Rc::new(Cell::new(0));
        let counter = stops.clone();
        let mut session = PlaybackSession::new(&sequence(), 120, false).unwrap();
        session.set_on_stop(move || counter.set(counter.get() + 1));
        let mut recorder = Recorder::default();

        session.advance(1.0, &mut recorder);
        assert!(recorder.notes.is_empty());

        session.play();
        assert!(session.is_playing());
        session.advance(0.0, &mut recorder);
        session.advance(1.2, &mut recorder);
        assert_eq!(recorder.notes.len(), 2);
        session.advance(0.5, &mut recorder);
        assert_eq!(recorder.notes.len(), 3);
        assert!(session.is_playing());
        session.advance(0.5, &mut recorder);
        assert!(!session.is_playing());
        assert_eq!(stops.get(), 1);
        session.stop();
        assert_eq!(stops.get(), 1);
        assert!(recorder.loop_starts.is_empty());
        assert_eq!(recorder.notes[1], (1.0, "E4".to_string(), 1));
    }

    #[test]
    fn test_looping_wraps() {
        let stops = Rc::new(Cell::new(0));
        let counter = stops.clone();
        let mut session = PlaybackSession::new(&sequence(), 120, true).unwrap();
        session.set_on_stop(move || counter.set(counter.get() + 1));
        let mut recorder = Recorder::default();
        session.play();
        session.advance(4.5, &mut recorder);

        assert_eq!(recorder.loop_starts, vec![(0.0, 0), (2.0, 1), (4.0, 2)]);
        assert_eq!(recorder.loop_ends, vec![(2.0, 0), (4.0, 1)]);
        assert_eq!(recorder.notes.len(), 7);
        assert_eq!(recorder.notes[3], (2.0, "C4".to_string(), 0));
        assert!(session.is_playing());

        session.stop();
        assert_eq!(stops.get(), 1);
        session.play();
        session.stop();
        assert_eq!(stops.get(), 2);
    }
}
