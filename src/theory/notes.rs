use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Lowest and highest notes of the master list (A0 and C8, a piano keyboard).
pub const LOWEST_MIDI: i32 = 21;
pub const HIGHEST_MIDI: i32 = 108;

/// Split a leading letter + accidental off a token, returning the semitone
/// value relative to C and the unparsed remainder. Letters are upper case so
/// that `b3` stays a degree, never a note.
fn parse_letter(token: &str) -> Option<(i32, &str)> {
    let mut chars = token.chars();
    let step = chars.next()?;
    let base = match step {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (alter, rest) = if let Some(r) = rest.strip_prefix('#') {
        (1, r)
    } else if let Some(r) = rest.strip_prefix('b') {
        (-1, r)
    } else {
        (0, rest)
    };
    Some((base + alter, rest))
}

/// A pitch class, 0 = C through 11 = B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn new(semitone: i32) -> Self {
        PitchClass(semitone.rem_euclid(12) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.0 as usize]
    }

    /// Semitones from `self` up to `other`, 0-11.
    pub fn offset_to(self, other: PitchClass) -> u8 {
        (other.0 as i32 - self.0 as i32).rem_euclid(12) as u8
    }

    pub fn transpose(self, semitones: i32) -> PitchClass {
        PitchClass::new(self.0 as i32 + semitones)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_letter(s.trim()) {
            Some((semitone, "")) => Ok(PitchClass::new(semitone)),
            _ => Err(GenerationError::UnknownKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for PitchClass {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PitchClass> for String {
    fn from(value: PitchClass) -> Self {
        value.to_string()
    }
}

/// A concrete pitch such as `C#4`. Ordered by pitch height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteName {
    midi: i32,
}

impl NoteName {
    pub fn from_midi(midi: i32) -> Self {
        NoteName { midi }
    }

    pub fn midi(self) -> i32 {
        self.midi
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::new(self.midi)
    }

    pub fn octave(self) -> i32 {
        self.midi.div_euclid(12) - 1
    }

    /// Position in the master list, if the note lies within it.
    pub fn master_index(self) -> Option<usize> {
        if (LOWEST_MIDI..=HIGHEST_MIDI).contains(&self.midi) {
            Some((self.midi - LOWEST_MIDI) as usize)
        } else {
            None
        }
    }

    pub fn transpose(self, semitones: i32) -> NoteName {
        NoteName::from_midi(self.midi + semitones)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for NoteName {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let (semitone, octave_str) =
            parse_letter(token).ok_or_else(|| GenerationError::UnknownNote(s.to_string()))?;
        let octave: i32 = octave_str
            .parse()
            .map_err(|_| GenerationError::UnknownNote(s.to_string()))?;
        octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|base| base.checked_add(semitone))
            .map(NoteName::from_midi)
            .ok_or_else(|| GenerationError::UnknownNote(s.to_string()))
    }
}

impl TryFrom<String> for NoteName {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteName> for String {
    fn from(value: NoteName) -> Self {
        value.to_string()
    }
}

/// The master pitch-ordered note list, A0 through C8.
pub fn master_notes() -> Vec<NoteName> {
    (LOWEST_MIDI..=HIGHEST_MIDI).map(NoteName::from_midi).collect()
}

/// Absolute distance in semitones between two notes of the master list.
pub fn interval_semitones(a: NoteName, b: NoteName) -> Result<u32, GenerationError> {
    let ia = a
        .master_index()
        .ok_or_else(|| GenerationError::UnknownNote(a.to_string()))?;
    let ib = b
        .master_index()
        .ok_or_else(|| GenerationError::UnknownNote(b.to_string()))?;
    Ok(ia.abs_diff(ib) as u32)
}
